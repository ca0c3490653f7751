#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! U.S. city and state catalog with boundary `GeoJSON` resolution.
//!
//! Resolves a human-selected city to the boundary polygon the query engine
//! passes through to the remote API. Boundary files come from the
//! `generalpiston/geojson-us-city-boundaries` GitHub repository; the catalog
//! of available states and cities is built once from the repository contents
//! API and cached locally as JSON so later sessions start without any
//! network round trips.

pub mod boundary;
pub mod catalog;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use catalog::CityCatalog;

/// Errors from catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The state-name CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested state code is not in the catalog.
    #[error("No state found with code '{code}'")]
    MissingState {
        /// The state code that was looked up.
        code: String,
    },

    /// A response or boundary document did not have the expected shape.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// One city with a known boundary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityInfo {
    /// Lowercase city name as it appears in the boundary repository.
    pub name: String,
    /// Repository path of the boundary file.
    pub path: String,
    /// GitHub HTML URL of the boundary file.
    pub url: String,
}

impl CityInfo {
    /// The raw-content URL for the boundary file (GitHub `blob` URLs serve
    /// an HTML page; the `raw` form serves the `GeoJSON` itself).
    #[must_use]
    pub fn raw_url(&self) -> String {
        self.url.replace("blob", "raw/refs/heads")
    }

    /// The city name in title case, for display.
    #[must_use]
    pub fn display_name(&self) -> String {
        title_case(&self.name)
    }
}

impl fmt::Display for CityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// One U.S. state and the cities with boundary files in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInfo {
    /// Lowercase two-letter state code.
    pub abbrev: String,
    /// Full state name.
    pub name: String,
    /// Repository path of the state's city directory.
    pub path: String,
    /// GitHub HTML URL of the state's city directory.
    pub url: String,
    /// Cities keyed by lowercase name.
    #[serde(default)]
    pub cities: BTreeMap<String, CityInfo>,
}

impl fmt::Display for StateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.abbrev.to_uppercase(), self.name)
    }
}

/// Title-cases a (typically lowercase, space-separated) place name.
#[must_use]
pub fn title_case(name: &str) -> String {
    name.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_url_rewrites_blob_form() {
        let city = CityInfo {
            name: "new york".to_string(),
            path: "cities/ny/new-york.json".to_string(),
            url: "https://github.com/generalpiston/geojson-us-city-boundaries/blob/master/cities/ny/new-york.json".to_string(),
        };
        assert_eq!(
            city.raw_url(),
            "https://github.com/generalpiston/geojson-us-city-boundaries/raw/refs/heads/master/cities/ny/new-york.json"
        );
    }

    #[test]
    fn display_forms() {
        let city = CityInfo {
            name: "new york".to_string(),
            path: String::new(),
            url: String::new(),
        };
        assert_eq!(city.to_string(), "New York");

        let state = StateInfo {
            abbrev: "ny".to_string(),
            name: "New York".to_string(),
            path: String::new(),
            url: String::new(),
            cities: BTreeMap::new(),
        };
        assert_eq!(state.to_string(), "NY: New York");
    }
}
