//! The city catalog: build, cache, and query the set of available cities.
//!
//! The catalog is built from the boundary repository's contents API (one
//! listing for the state directories, one per state for its city files) and
//! exported to a local JSON cache. Subsequent sessions import the cache
//! instead of touching the network.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::{CatalogError, CityInfo, StateInfo};

/// GitHub repository holding the boundary files.
const BOUNDARY_REPO_OWNER: &str = "generalpiston";
const BOUNDARY_REPO_NAME: &str = "geojson-us-city-boundaries";

/// Default location of the exported catalog cache.
pub const DEFAULT_CACHE_PATH: &str = "data/cities/cities.json";

/// Default location of the state abbreviation/name table.
pub const DEFAULT_STATE_NAMES_PATH: &str = "data/US_States.csv";

/// Courtesy delay between per-state contents requests.
const INTER_STATE_DELAY: Duration = Duration::from_millis(200);

/// The catalog of U.S. states and cities with known boundary files.
#[derive(Debug, Clone, Default)]
pub struct CityCatalog {
    states: BTreeMap<String, StateInfo>,
}

impl CityCatalog {
    /// Loads the catalog from the local cache if present, otherwise builds
    /// it from the boundary repository and writes the cache for next time.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if neither the cache nor the remote
    /// repository can produce a catalog.
    pub async fn load(client: &reqwest::Client) -> Result<Self, CatalogError> {
        Self::load_with_paths(client, DEFAULT_CACHE_PATH, DEFAULT_STATE_NAMES_PATH).await
    }

    /// [`Self::load`] with explicit cache and state-name table locations.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if neither the cache nor the remote
    /// repository can produce a catalog.
    pub async fn load_with_paths(
        client: &reqwest::Client,
        cache_path: impl AsRef<Path>,
        state_names_path: impl AsRef<Path>,
    ) -> Result<Self, CatalogError> {
        let cache_path = cache_path.as_ref();

        if cache_path.exists() {
            log::info!("Loading city catalog from {}", cache_path.display());
            return Self::from_cache_file(cache_path);
        }

        log::info!(
            "No catalog cache at {}; building from the {BOUNDARY_REPO_OWNER}/{BOUNDARY_REPO_NAME} repository",
            cache_path.display()
        );
        let state_names = state_names_from_csv(state_names_path.as_ref())?;
        let catalog = Self::fetch_remote(client, &state_names).await?;

        catalog.export_cache(cache_path)?;
        log::info!(
            "City catalog exported to {} for future sessions",
            cache_path.display()
        );

        Ok(catalog)
    }

    /// Imports a previously exported catalog cache.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be read or decoded.
    pub fn from_cache_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        let states: Vec<StateInfo> = serde_json::from_str(&contents)?;
        Ok(Self::from_states(states))
    }

    /// Builds a catalog from pre-resolved state entries.
    #[must_use]
    pub fn from_states(states: Vec<StateInfo>) -> Self {
        Self {
            states: states
                .into_iter()
                .map(|state| (state.abbrev.clone(), state))
                .collect(),
        }
    }

    /// Builds the catalog by listing the boundary repository.
    async fn fetch_remote(
        client: &reqwest::Client,
        state_names: &BTreeMap<String, String>,
    ) -> Result<Self, CatalogError> {
        let entries = github_contents(client, "cities").await?;

        let mut states = BTreeMap::new();
        for entry in &entries {
            if entry.get("type").and_then(serde_json::Value::as_str) != Some("dir") {
                continue;
            }
            let (name, path, url) = entry_fields(entry)?;
            let full_name = state_names
                .get(&name.to_uppercase())
                .cloned()
                .unwrap_or_else(|| name.to_uppercase());

            states.insert(
                name.clone(),
                StateInfo {
                    abbrev: name,
                    name: full_name,
                    path,
                    url,
                    cities: BTreeMap::new(),
                },
            );
        }

        for state in states.values_mut() {
            log::info!(
                "Listing boundary files for {} ({})",
                state.name,
                state.abbrev
            );
            state.cities = fetch_state_cities(client, &state.abbrev).await?;
            tokio::time::sleep(INTER_STATE_DELAY).await;
        }

        Ok(Self { states })
    }

    /// Exports the catalog to a JSON cache file, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the file cannot be written.
    pub fn export_cache(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let states: Vec<&StateInfo> = self.states.values().collect();
        std::fs::write(path, serde_json::to_string_pretty(&states)?)?;
        Ok(())
    }

    /// Display strings for states whose display form starts with `prefix`
    /// (e.g. prefix `"N"` matches `"NY: New York"`).
    #[must_use]
    pub fn states_starting_with(&self, prefix: &str) -> Vec<String> {
        self.states
            .values()
            .map(StateInfo::to_string)
            .filter(|display| display.starts_with(prefix))
            .collect()
    }

    /// The state entry for a lowercase two-letter code.
    #[must_use]
    pub fn state_by_code(&self, code: &str) -> Option<&StateInfo> {
        self.states.get(&code.to_lowercase())
    }

    /// City names in a state that start with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MissingState`] if the state code is unknown.
    pub fn cities_starting_with(
        &self,
        state_code: &str,
        prefix: &str,
    ) -> Result<Vec<String>, CatalogError> {
        let state = self
            .state_by_code(state_code)
            .ok_or_else(|| CatalogError::MissingState {
                code: state_code.to_string(),
            })?;

        Ok(state
            .cities
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    /// The first city in a state whose name starts with `search`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::MissingState`] if the state code is unknown.
    pub fn find_city(
        &self,
        state_code: &str,
        search: &str,
    ) -> Result<Option<&CityInfo>, CatalogError> {
        let state = self
            .state_by_code(state_code)
            .ok_or_else(|| CatalogError::MissingState {
                code: state_code.to_string(),
            })?;

        let search = search.to_lowercase();
        Ok(state
            .cities
            .iter()
            .find(|(name, _)| name.starts_with(&search))
            .map(|(_, city)| city))
    }

    /// Number of states in the catalog.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

/// Lists the boundary files for one state and keys them by city name.
async fn fetch_state_cities(
    client: &reqwest::Client,
    state_code: &str,
) -> Result<BTreeMap<String, CityInfo>, CatalogError> {
    let entries = github_contents(client, &format!("cities/{state_code}")).await?;

    let mut cities = BTreeMap::new();
    for entry in &entries {
        let (file_name, path, url) = entry_fields(entry)?;
        let Some(name) = file_name.strip_suffix(".json") else {
            continue;
        };
        cities.insert(
            name.to_string(),
            CityInfo {
                name: name.to_string(),
                path,
                url,
            },
        );
    }
    Ok(cities)
}

/// Fetches a directory listing from the GitHub repository contents API.
async fn github_contents(
    client: &reqwest::Client,
    path: &str,
) -> Result<Vec<serde_json::Value>, CatalogError> {
    let url = format!(
        "https://api.github.com/repos/{BOUNDARY_REPO_OWNER}/{BOUNDARY_REPO_NAME}/contents/{path}"
    );
    let body: serde_json::Value = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    body.as_array()
        .cloned()
        .ok_or_else(|| CatalogError::Conversion {
            message: format!("contents listing for '{path}' is not an array"),
        })
}

/// Pulls the `name`, `path`, and `_links.html` fields out of one contents
/// API entry.
fn entry_fields(entry: &serde_json::Value) -> Result<(String, String, String), CatalogError> {
    let field = |pointer: &str| {
        entry
            .pointer(pointer)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CatalogError::Conversion {
                message: format!("contents entry is missing '{pointer}'"),
            })
    };
    Ok((field("/name")?, field("/path")?, field("/_links/html")?))
}

/// Loads the abbreviation-to-name table from the state CSV
/// (columns `State`, `Abbreviation`).
fn state_names_from_csv(path: &Path) -> Result<BTreeMap<String, String>, CatalogError> {
    #[derive(serde::Deserialize)]
    struct Row {
        #[serde(rename = "State")]
        state: String,
        #[serde(rename = "Abbreviation")]
        abbreviation: String,
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut names = BTreeMap::new();
    for row in reader.deserialize::<Row>() {
        let row = row?;
        names.insert(row.abbreviation, row.state);
    }

    log::debug!("Loaded {} state names from {}", names.len(), path.display());
    Ok(names)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_catalog() -> CityCatalog {
        let city = |name: &str| CityInfo {
            name: name.to_string(),
            path: format!("cities/xx/{name}.json"),
            url: format!("https://github.com/x/y/blob/master/cities/xx/{name}.json"),
        };

        CityCatalog::from_states(vec![
            StateInfo {
                abbrev: "ny".to_string(),
                name: "New York".to_string(),
                path: "cities/ny".to_string(),
                url: String::new(),
                cities: [
                    ("albany".to_string(), city("albany")),
                    ("buffalo".to_string(), city("buffalo")),
                    ("new york".to_string(), city("new york")),
                ]
                .into_iter()
                .collect(),
            },
            StateInfo {
                abbrev: "nj".to_string(),
                name: "New Jersey".to_string(),
                path: "cities/nj".to_string(),
                url: String::new(),
                cities: BTreeMap::new(),
            },
            StateInfo {
                abbrev: "ca".to_string(),
                name: "California".to_string(),
                path: "cities/ca".to_string(),
                url: String::new(),
                cities: BTreeMap::new(),
            },
        ])
    }

    #[test]
    fn filters_states_by_display_prefix() {
        let catalog = sample_catalog();
        let matches = catalog.states_starting_with("N");
        assert_eq!(matches, vec!["NJ: New Jersey", "NY: New York"]);
        assert!(catalog.states_starting_with("Z").is_empty());
    }

    #[test]
    fn state_lookup_is_case_insensitive() {
        let catalog = sample_catalog();
        assert_eq!(catalog.state_by_code("NY").unwrap().name, "New York");
        assert!(catalog.state_by_code("zz").is_none());
    }

    #[test]
    fn filters_cities_by_prefix() {
        let catalog = sample_catalog();
        let cities = catalog.cities_starting_with("ny", "b").unwrap();
        assert_eq!(cities, vec!["buffalo"]);

        let err = catalog.cities_starting_with("zz", "b").unwrap_err();
        assert!(matches!(err, CatalogError::MissingState { .. }));
    }

    #[test]
    fn finds_first_city_matching_search() {
        let catalog = sample_catalog();
        let city = catalog.find_city("ny", "New Y").unwrap().unwrap();
        assert_eq!(city.name, "new york");
        assert!(catalog.find_city("ny", "zzz").unwrap().is_none());
    }

    #[test]
    fn cache_round_trips() {
        let catalog = sample_catalog();
        let path = std::env::temp_dir().join(format!(
            "worldpop-catalog-test-{}.json",
            std::process::id()
        ));

        catalog.export_cache(&path).unwrap();
        let restored = CityCatalog::from_cache_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.state_count(), 3);
        assert_eq!(
            restored.find_city("ny", "alb").unwrap().unwrap().name,
            "albany"
        );
    }

    #[test]
    fn entry_fields_requires_links() {
        let entry = json!({"name": "ny", "path": "cities/ny"});
        assert!(entry_fields(&entry).is_err());

        let entry = json!({
            "name": "ny",
            "path": "cities/ny",
            "_links": {"html": "https://github.com/x"}
        });
        let (name, path, url) = entry_fields(&entry).unwrap();
        assert_eq!(name, "ny");
        assert_eq!(path, "cities/ny");
        assert_eq!(url, "https://github.com/x");
    }
}
