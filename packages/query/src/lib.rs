#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query orchestration engine for the WorldPop advanced data API.
//!
//! Given a dataset kind, a year range, and a boundary polygon, the engine
//! creates one server-side computation task per year, polls every task to a
//! terminal state, and decodes the terminal payloads into a year-indexed
//! result map. The three phases — submission ([`QueryOrchestrator::submit_all`]),
//! monitoring ([`QueryOrchestrator::monitor_until_done`]), and aggregation
//! ([`aggregate`]) — are also exposed individually; [`QueryOrchestrator::run_query`]
//! chains them.
//!
//! All I/O goes through the [`fetch::Fetch`] trait, so the engine itself
//! never touches the network directly and can be tested against scripted
//! responses.

pub mod fetch;
pub mod orchestrator;

pub use fetch::{Fetch, FetchError, WorldPopClient};
pub use orchestrator::{QueryOrchestrator, TaskReport, aggregate};
pub use worldpop_query_models::{
    AgeSexBucket, DatasetKind, InvalidRangeError, QueryOutcome, QuerySpec, ResultMap,
    SubmissionBatch, SubmissionOutcome, YearValue,
};

/// Errors from the query orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The requested year range is inverted.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),

    /// The serialized boundary made the request URL too long for the remote
    /// API to accept. Retrying with the same boundary cannot succeed.
    #[error(
        "City boundary extremely complex: the GeoJSON expression makes the request URL \
         {url_len} bytes long, which the remote API rejects. Try another city or a \
         simplified boundary"
    )]
    OversizedBoundary {
        /// Length of the rejected request URL in bytes.
        url_len: usize,
    },

    /// Polling a task kept failing at the transport level past the retry
    /// limit.
    #[error("Polling task {task_id} failed after repeated transport errors: {message}")]
    Poll {
        /// The task whose polls failed.
        task_id: String,
        /// The last transport error observed.
        message: String,
    },

    /// The server completed a task but marked it as failed. Invalidates the
    /// whole batch; no partial results are returned.
    #[error("Remote task failed: {message}")]
    Task {
        /// The server-provided error message.
        message: String,
    },

    /// The query was cancelled while polling.
    #[error("Query cancelled")]
    Cancelled,

    /// A response from the server was missing a required field or carried
    /// an undecodable payload.
    #[error("Malformed API response: {message}")]
    MalformedResponse {
        /// Description of what was missing or undecodable.
        message: String,
    },

    /// A request URL could not be constructed.
    #[error("Invalid request URL: {0}")]
    Url(String),

    /// The boundary polygon could not be serialized.
    #[error("Boundary serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
