#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for WorldPop population queries.
//!
//! These types describe the inputs and outputs of the query orchestration
//! engine: which dataset to query, over which year range and boundary, and
//! the per-year results the engine produces. They carry no I/O and no
//! orchestration logic, so callers (the CLI, exporters, tests) can depend
//! on them without pulling in the HTTP stack.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which statistical product to request from the WorldPop advanced data API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetKind {
    /// A single total population count per year.
    TotalPopulation,
    /// An age/sex structure breakdown (population pyramid) per year.
    AgeSexStructure,
}

impl DatasetKind {
    /// All dataset kinds, in menu presentation order.
    pub const ALL: &[Self] = &[Self::TotalPopulation, Self::AgeSexStructure];

    /// The dataset identifier token the remote API expects.
    ///
    /// This is the only place the remote vocabulary appears; callers speak
    /// in [`DatasetKind`] values exclusively.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::TotalPopulation => "wpgppop",
            Self::AgeSexStructure => "wpgpas",
        }
    }

    /// Human-readable label for menus and result headers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TotalPopulation => "Total Population",
            Self::AgeSexStructure => "Age and Sex Structures",
        }
    }
}

/// The requested year range is inverted (`start_year > end_year`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid year range: start year {start_year} is after end year {end_year}")]
pub struct InvalidRangeError {
    /// First year of the requested range.
    pub start_year: i32,
    /// Last year of the requested range.
    pub end_year: i32,
}

/// Immutable description of one population query.
///
/// Created once per user query and never mutated. The boundary is an opaque
/// `GeoJSON`-like value resolved by the geographic catalog; the engine
/// serializes it into the request URL without inspecting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    dataset: DatasetKind,
    start_year: i32,
    end_year: i32,
    boundary: serde_json::Value,
}

impl QuerySpec {
    /// Creates a validated query spec.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRangeError`] if `start_year > end_year`. Callers
    /// typically validate before prompting, but the spec re-validates so a
    /// malformed range can never reach the wire.
    pub fn new(
        dataset: DatasetKind,
        start_year: i32,
        end_year: i32,
        boundary: serde_json::Value,
    ) -> Result<Self, InvalidRangeError> {
        if start_year > end_year {
            return Err(InvalidRangeError {
                start_year,
                end_year,
            });
        }
        Ok(Self {
            dataset,
            start_year,
            end_year,
            boundary,
        })
    }

    /// The dataset kind this query requests.
    #[must_use]
    pub const fn dataset(&self) -> DatasetKind {
        self.dataset
    }

    /// First year of the range (inclusive).
    #[must_use]
    pub const fn start_year(&self) -> i32 {
        self.start_year
    }

    /// Last year of the range (inclusive).
    #[must_use]
    pub const fn end_year(&self) -> i32 {
        self.end_year
    }

    /// The boundary polygon, passed through unmodified.
    #[must_use]
    pub const fn boundary(&self) -> &serde_json::Value {
        &self.boundary
    }

    /// Iterates the requested years in ascending order.
    pub fn years(&self) -> impl Iterator<Item = i32> + use<> {
        self.start_year..=self.end_year
    }

    /// Number of years in the range.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn year_count(&self) -> usize {
        (self.end_year - self.start_year) as usize + 1
    }
}

/// The outcome of submitting one per-year computation request.
///
/// Submission is best-effort per year: a failed submission records `None`
/// rather than aborting the batch, so the caller can report exactly which
/// years have no server-side task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// The year this submission covers.
    pub year: i32,
    /// The server-assigned task id, or `None` if submission failed.
    pub task_id: Option<String>,
}

/// Ordered submission outcomes for a whole year range.
///
/// This is the single source of truth linking user-facing years to
/// server-side tasks. It is an explicit value threaded between the
/// submission, polling, and aggregation phases rather than hidden state,
/// so each phase can be tested in isolation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionBatch {
    /// Per-year outcomes, in ascending year order.
    pub outcomes: Vec<SubmissionOutcome>,
}

impl SubmissionBatch {
    /// The `year -> task_id` map for successfully submitted years.
    #[must_use]
    pub fn year_tasks(&self) -> BTreeMap<i32, String> {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .task_id
                    .as_ref()
                    .map(|task_id| (outcome.year, task_id.clone()))
            })
            .collect()
    }

    /// Task ids for all successfully submitted years, in year order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.task_id.clone())
            .collect()
    }

    /// Years for which no server-side task exists.
    #[must_use]
    pub fn missing_years(&self) -> Vec<i32> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.task_id.is_none())
            .map(|outcome| outcome.year)
            .collect()
    }

    /// `true` if every submission in the batch failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| outcome.task_id.is_none())
    }
}

/// One decoded population pyramid row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeSexBucket {
    /// Zero-based pyramid class index, as assigned by the server.
    pub class_index: u32,
    /// Human-readable age range (e.g. "0-4").
    pub age_range: String,
    /// Male population in this bucket.
    pub male: f64,
    /// Female population in this bucket.
    pub female: f64,
}

/// The decoded result for a single year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum YearValue {
    /// Scalar total population (dataset kind [`DatasetKind::TotalPopulation`]).
    Total(f64),
    /// Ordered pyramid rows (dataset kind [`DatasetKind::AgeSexStructure`]).
    Pyramid(Vec<AgeSexBucket>),
}

/// Final query output: year-indexed decoded results.
///
/// Keys are exactly the years whose task both exists and terminated
/// successfully. `BTreeMap` keeps iteration in ascending year order.
pub type ResultMap = BTreeMap<i32, YearValue>;

/// Everything a caller needs to present a completed query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Decoded per-year results.
    pub results: ResultMap,
    /// Years that never got a server-side task (submission failures).
    pub missing_years: Vec<i32>,
}

impl QueryOutcome {
    /// `true` if the query produced no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_year_range() {
        let err = QuerySpec::new(
            DatasetKind::TotalPopulation,
            2021,
            2020,
            serde_json::Value::Null,
        )
        .unwrap_err();
        assert_eq!(err.start_year, 2021);
        assert_eq!(err.end_year, 2020);
    }

    #[test]
    fn single_year_range_has_one_year() {
        let spec = QuerySpec::new(
            DatasetKind::TotalPopulation,
            2020,
            2020,
            serde_json::Value::Null,
        )
        .unwrap();
        assert_eq!(spec.years().collect::<Vec<_>>(), vec![2020]);
        assert_eq!(spec.year_count(), 1);
    }

    #[test]
    fn years_ascend() {
        let spec = QuerySpec::new(
            DatasetKind::AgeSexStructure,
            2018,
            2021,
            serde_json::Value::Null,
        )
        .unwrap();
        assert_eq!(
            spec.years().collect::<Vec<_>>(),
            vec![2018, 2019, 2020, 2021]
        );
    }

    #[test]
    fn batch_views_split_present_and_missing() {
        let batch = SubmissionBatch {
            outcomes: vec![
                SubmissionOutcome {
                    year: 2019,
                    task_id: Some("t19".to_string()),
                },
                SubmissionOutcome {
                    year: 2020,
                    task_id: None,
                },
                SubmissionOutcome {
                    year: 2021,
                    task_id: Some("t21".to_string()),
                },
            ],
        };

        assert_eq!(batch.missing_years(), vec![2020]);
        assert_eq!(batch.task_ids(), vec!["t19", "t21"]);
        assert!(!batch.all_failed());

        let map = batch.year_tasks();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&2019], "t19");
        assert_eq!(map[&2021], "t21");
    }

    #[test]
    fn empty_batch_counts_as_all_failed() {
        let batch = SubmissionBatch {
            outcomes: vec![SubmissionOutcome {
                year: 2020,
                task_id: None,
            }],
        };
        assert!(batch.all_failed());
        assert!(batch.year_tasks().is_empty());
    }

    #[test]
    fn dataset_tokens_are_fixed() {
        assert_eq!(DatasetKind::TotalPopulation.token(), "wpgppop");
        assert_eq!(DatasetKind::AgeSexStructure.token(), "wpgpas");
    }
}
