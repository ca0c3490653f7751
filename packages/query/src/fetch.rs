//! The async fetch seam between the orchestrator and the network.
//!
//! The orchestration engine performs exactly one kind of I/O: `GET` a URL,
//! decode the body as JSON. That single primitive is captured by the
//! [`Fetch`] trait so the submission and polling phases can be driven by a
//! scripted fake in tests. [`WorldPopClient`] is the production
//! implementation backed by `reqwest`.

use reqwest::{StatusCode, Url};

/// Request URLs longer than this are assumed to be rejected by the remote
/// server at the connection level, before any HTTP status is produced.
pub const MAX_URL_LEN: usize = 8000;

/// Errors from the fetch primitive.
///
/// `Oversized` is kept distinct from generic transport failures so callers
/// can give a specific diagnostic ("boundary too complex") instead of a
/// generic network error.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request URL was too long for the server to accept.
    #[error("Request URL too long ({url_len} bytes)")]
    Oversized {
        /// Length of the rejected URL in bytes.
        url_len: usize,
    },

    /// An HTTP request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status {status} from {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The URL that produced it.
        url: String,
    },
}

/// Trait for fetching a JSON document from a URL.
///
/// The sole I/O primitive the orchestration engine consumes. Implementations
/// must be `Send + Sync` so poll loops can run concurrently across spawned
/// futures.
pub trait Fetch: Send + Sync {
    /// Performs a `GET` request and decodes the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the request fails, the server answers with
    /// a non-success status, or the body is not valid JSON.
    fn get_json(
        &self,
        url: Url,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, FetchError>> + Send;
}

/// Production [`Fetch`] implementation backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct WorldPopClient {
    client: reqwest::Client,
}

impl WorldPopClient {
    /// Creates a client with connection pooling and a descriptive user agent.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the underlying `reqwest` client cannot be
    /// built.
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("worldpop-query/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for WorldPopClient {
    async fn get_json(&self, url: Url) -> Result<serde_json::Value, FetchError> {
        let url_len = url.as_str().len();

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                // Servers refuse the connection outright when the query
                // string exceeds their limits, so a connect failure on a
                // very long URL is almost certainly a size rejection.
                if e.is_connect() && url_len > MAX_URL_LEN {
                    return Err(FetchError::Oversized { url_len });
                }
                return Err(FetchError::Http(e));
            }
        };

        if response.status() == StatusCode::URI_TOO_LONG {
            return Err(FetchError::Oversized { url_len });
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json().await?)
    }
}
