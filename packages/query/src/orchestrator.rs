//! Query lifecycle orchestration: submission, polling, and aggregation.
//!
//! One remote computation task is created per year in the requested range.
//! The server runs each task asynchronously, so the engine polls every
//! outstanding task until it reaches a terminal state, then decodes the
//! terminal payloads into a year-indexed result map.
//!
//! The three phases communicate only through explicit values (the
//! [`SubmissionBatch`] and the `year -> task_id` map it derives), so each
//! phase can be exercised in isolation.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::try_join_all;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use worldpop_query_models::{
    AgeSexBucket, DatasetKind, QueryOutcome, QuerySpec, ResultMap, SubmissionBatch,
    SubmissionOutcome, YearValue,
};

use crate::QueryError;
use crate::fetch::{Fetch, FetchError};

/// Default WorldPop advanced data API root.
const DEFAULT_BASE_URL: &str = "https://api.worldpop.org/v1";

/// Environment variable overriding the API root (useful for test servers).
const BASE_URL_ENV: &str = "WORLDPOP_BASE_URL";

/// Task status value that will not change further.
const TERMINAL_STATUS: &str = "finished";

/// Fixed delay between consecutive polls of the same task. No exponential
/// growth; the not-yet-finished path is the normal case, not a failure.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive poll transport failures tolerated per task before the
/// monitor loop escalates.
const POLL_RETRY_LIMIT: u32 = 3;

/// A task's terminal response, tagged with the task id it belongs to.
///
/// The id is recorded by the poll loop itself rather than read back out of
/// the payload, so aggregation can re-key results even if the server omits
/// it from the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// The server-assigned task id.
    pub task_id: String,
    /// The full terminal response body.
    pub body: serde_json::Value,
}

/// Owns the full query lifecycle against one API root.
///
/// Generic over [`Fetch`] so tests can drive submission and polling with
/// scripted responses. One instance may serve many queries sequentially;
/// no state is carried across invocations.
#[derive(Debug)]
pub struct QueryOrchestrator<F: Fetch> {
    fetch: F,
    base_url: String,
    poll_interval: Duration,
    poll_retry_limit: u32,
}

impl<F: Fetch> QueryOrchestrator<F> {
    /// Creates an orchestrator against the default API root, or the root
    /// named by `WORLDPOP_BASE_URL` if set.
    pub fn new(fetch: F) -> Self {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(fetch, &base_url)
    }

    /// Creates an orchestrator against an explicit API root.
    pub fn with_base_url(fetch: F, base_url: &str) -> Self {
        Self {
            fetch,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: POLL_INTERVAL,
            poll_retry_limit: POLL_RETRY_LIMIT,
        }
    }

    /// Overrides the fixed delay between polls of the same task.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Builds the submission URL for one year of the query.
    fn stats_url(
        &self,
        dataset: DatasetKind,
        year: i32,
        boundary_json: &str,
    ) -> Result<Url, QueryError> {
        Url::parse_with_params(
            &format!("{}/services/stats", self.base_url),
            &[
                ("dataset", dataset.token()),
                ("year", &year.to_string()),
                ("geojson", boundary_json),
            ],
        )
        .map_err(|e| QueryError::Url(e.to_string()))
    }

    /// Builds the status-poll URL for one task.
    fn task_url(&self, task_id: &str) -> Result<Url, QueryError> {
        Url::parse(&format!("{}/tasks/{}", self.base_url, task_id))
            .map_err(|e| QueryError::Url(e.to_string()))
    }

    /// Submits one computation request per year, in ascending year order.
    ///
    /// Submission is best-effort per year: a transport or server failure for
    /// one year records a missing task and moves on rather than aborting the
    /// batch. The one exception is an oversized request, which would fail
    /// identically for every year and therefore aborts immediately with
    /// [`QueryError::OversizedBoundary`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the boundary cannot be serialized, the
    /// request URL is oversized, or a submission response carries no task id.
    pub async fn submit_all(&self, spec: &QuerySpec) -> Result<SubmissionBatch, QueryError> {
        let boundary_json = serde_json::to_string(spec.boundary())?;
        let mut outcomes = Vec::with_capacity(spec.year_count());

        for year in spec.years() {
            let url = self.stats_url(spec.dataset(), year, &boundary_json)?;

            match self.fetch.get_json(url).await {
                Ok(body) => {
                    let task_id = task_id_field(&body).ok_or_else(|| {
                        QueryError::MalformedResponse {
                            message: format!("submission response for year {year} has no taskid"),
                        }
                    })?;
                    log::debug!("Year {year}: created task {task_id}");
                    outcomes.push(SubmissionOutcome {
                        year,
                        task_id: Some(task_id),
                    });
                }
                Err(FetchError::Oversized { url_len }) => {
                    return Err(QueryError::OversizedBoundary { url_len });
                }
                Err(e) => {
                    log::warn!("Year {year}: submission failed: {e}");
                    outcomes.push(SubmissionOutcome {
                        year,
                        task_id: None,
                    });
                }
            }
        }

        Ok(SubmissionBatch { outcomes })
    }

    /// Polls every outstanding task concurrently until all reach a terminal
    /// state, and returns one [`TaskReport`] per task.
    ///
    /// Each task gets its own poll loop with a fixed, non-blocking delay
    /// between checks; the loops are fanned in so total wall-clock time is
    /// bounded by the slowest task, not the sum of all task latencies. Every
    /// task id passed in resolves to exactly one report unless the whole
    /// monitor aborts. An empty task list resolves immediately.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Poll`] if a task's polls keep failing at the
    /// transport level past the retry limit, or [`QueryError::Cancelled`]
    /// if `cancel` fires between polls.
    pub async fn monitor_until_done(
        &self,
        task_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskReport>, QueryError> {
        try_join_all(task_ids.iter().map(|task_id| self.poll_task(task_id, cancel))).await
    }

    /// Polls a single task until it reaches the terminal status.
    async fn poll_task(
        &self,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> Result<TaskReport, QueryError> {
        let url = self.task_url(task_id)?;
        let mut failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(QueryError::Cancelled);
            }

            match self.fetch.get_json(url.clone()).await {
                Ok(body) => {
                    failures = 0;
                    let status = body
                        .get("status")
                        .and_then(serde_json::Value::as_str)
                        .ok_or_else(|| QueryError::MalformedResponse {
                            message: format!("status response for task {task_id} has no status"),
                        })?;

                    if status == TERMINAL_STATUS {
                        log::debug!("Task {task_id} finished");
                        return Ok(TaskReport {
                            task_id: task_id.to_string(),
                            body,
                        });
                    }

                    log::trace!("Task {task_id} still {status}, re-polling");
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.poll_retry_limit {
                        return Err(QueryError::Poll {
                            task_id: task_id.to_string(),
                            message: e.to_string(),
                        });
                    }
                    log::warn!(
                        "Task {task_id}: poll failed ({failures}/{}): {e}",
                        self.poll_retry_limit
                    );
                }
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(QueryError::Cancelled),
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Runs the full query lifecycle: submit, monitor, aggregate.
    ///
    /// Years whose submission failed are reported in
    /// [`QueryOutcome::missing_years`]; if every submission failed the
    /// outcome is empty rather than an error, so callers can print a
    /// specific "no data" message.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] on an oversized boundary, a monitor abort, a
    /// task-level failure, or a malformed response.
    pub async fn run_query(
        &self,
        spec: &QuerySpec,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome, QueryError> {
        let batch = self.submit_all(spec).await?;
        let missing_years = batch.missing_years();

        if !missing_years.is_empty() {
            log::warn!("No task could be created for years: {missing_years:?}");
        }

        let year_tasks = batch.year_tasks();
        let reports = self.monitor_until_done(&batch.task_ids(), cancel).await?;
        let results = aggregate(&reports, spec.dataset(), &year_tasks)?;

        Ok(QueryOutcome {
            results,
            missing_years,
        })
    }
}

/// Decodes terminal task responses into the final year-indexed result map.
///
/// Pure function of its inputs. If any report carries a task-level error,
/// the whole batch is invalidated: the first error message encountered is
/// surfaced and no partial results are returned.
///
/// # Errors
///
/// Returns [`QueryError::Task`] on a task-level failure, or
/// [`QueryError::MalformedResponse`] if a payload cannot be decoded or a
/// report's task id is not in `year_tasks`.
pub fn aggregate(
    reports: &[TaskReport],
    dataset: DatasetKind,
    year_tasks: &BTreeMap<i32, String>,
) -> Result<ResultMap, QueryError> {
    // Any failed task invalidates the batch before any decoding happens.
    for report in reports {
        let errored = report
            .body
            .get("error")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if errored {
            let message = report
                .body
                .get("error_message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unspecified task error")
                .to_string();
            return Err(QueryError::Task { message });
        }
    }

    let task_years: BTreeMap<&str, i32> = year_tasks
        .iter()
        .map(|(year, task_id)| (task_id.as_str(), *year))
        .collect();

    let mut results = ResultMap::new();
    for report in reports {
        let year = task_years.get(report.task_id.as_str()).copied().ok_or_else(|| {
            QueryError::MalformedResponse {
                message: format!("task {} does not belong to this query", report.task_id),
            }
        })?;

        let data = report
            .body
            .get("data")
            .ok_or_else(|| QueryError::MalformedResponse {
                message: format!("finished task {} has no data payload", report.task_id),
            })?;

        let value = match dataset {
            DatasetKind::TotalPopulation => YearValue::Total(decode_total(data, year)?),
            DatasetKind::AgeSexStructure => YearValue::Pyramid(decode_pyramid(data, year)?),
        };
        results.insert(year, value);
    }

    Ok(results)
}

/// Extracts the task id from a submission response. The server has returned
/// both bare numbers and strings here, so accept either.
fn task_id_field(body: &serde_json::Value) -> Option<String> {
    match body.get("taskid")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads a numeric JSON field that may arrive as a number or a numeric
/// string.
fn numeric(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str()?.trim().parse().ok())
}

/// Decodes the scalar total-population payload for one year.
fn decode_total(data: &serde_json::Value, year: i32) -> Result<f64, QueryError> {
    data.get("total_population")
        .and_then(numeric)
        .ok_or_else(|| QueryError::MalformedResponse {
            message: format!("year {year}: data payload has no numeric total_population"),
        })
}

/// Decodes the age/sex pyramid payload for one year, preserving row order.
fn decode_pyramid(data: &serde_json::Value, year: i32) -> Result<Vec<AgeSexBucket>, QueryError> {
    let rows = data
        .get("agesexpyramid")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| QueryError::MalformedResponse {
            message: format!("year {year}: data payload has no agesexpyramid array"),
        })?;

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let class_index = row
                .get("class")
                .and_then(numeric)
                .ok_or_else(|| QueryError::MalformedResponse {
                    message: format!("year {year}: pyramid row {index} has no class"),
                })?;
            let age_range = row
                .get("age")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| QueryError::MalformedResponse {
                    message: format!("year {year}: pyramid row {index} has no age"),
                })?;
            let male = row.get("male").and_then(numeric).ok_or_else(|| {
                QueryError::MalformedResponse {
                    message: format!("year {year}: pyramid row {index} has no male count"),
                }
            })?;
            let female = row.get("female").and_then(numeric).ok_or_else(|| {
                QueryError::MalformedResponse {
                    message: format!("year {year}: pyramid row {index} has no female count"),
                }
            })?;

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Ok(AgeSexBucket {
                class_index: class_index as u32,
                age_range: age_range.to_string(),
                male,
                female,
            })
        })
        .collect()
}
