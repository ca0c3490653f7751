//! Query execution: prompt for a year range, run the orchestrator, and
//! print the per-year results.

use dialoguer::Input;
use tokio_util::sync::CancellationToken;
use worldpop_catalog::boundary;
use worldpop_cli_utils::MultiProgress;
use worldpop_query::{QueryError, QueryOrchestrator, WorldPopClient};
use worldpop_query_models::{DatasetKind, QueryOutcome, QuerySpec, YearValue};

use crate::select::SelectedCity;

/// A finished query with the context needed to label and export it.
#[derive(Debug, Clone)]
pub struct CompletedQuery {
    /// Display form of the queried city.
    pub city: String,
    /// Which dataset was queried.
    pub dataset: DatasetKind,
    /// First year of the range.
    pub start_year: i32,
    /// Last year of the range.
    pub end_year: i32,
    /// The decoded results.
    pub outcome: QueryOutcome,
}

/// Prompts for a year range and runs the full query lifecycle.
///
/// Returns `None` when the query produced nothing worth keeping (invalid
/// range, no data, or a failure that was reported to the user).
///
/// # Errors
///
/// Returns an error only for unrecoverable problems (prompt I/O, client
/// construction); query failures are printed and swallowed so the menu
/// loop continues.
pub async fn run_query_flow(
    client: &reqwest::Client,
    multi: &MultiProgress,
    city: &SelectedCity,
    dataset: DatasetKind,
) -> Result<Option<CompletedQuery>, Box<dyn std::error::Error>> {
    let start_year: i32 = Input::new()
        .with_prompt("Enter the initial year of the query")
        .interact_text()?;
    let end_year: i32 = Input::new()
        .with_prompt("Enter the end year of the query")
        .interact_text()?;

    if start_year > end_year {
        println!("Invalid range: start year must be less than or equal to end year.");
        return Ok(None);
    }

    let spinner = worldpop_cli_utils::wait_spinner(multi, "Downloading city boundary...");
    let raw_boundary = match boundary::fetch_boundary(client, &city.city).await {
        Ok(value) => value,
        Err(e) => {
            spinner.finish_and_clear();
            println!("Could not download the boundary for {}: {e}", city.display());
            return Ok(None);
        }
    };
    let boundary_value = match boundary::largest_single_part(&raw_boundary) {
        Ok(value) => value,
        Err(e) => {
            spinner.finish_and_clear();
            println!("Boundary for {} cannot be processed: {e}", city.display());
            return Ok(None);
        }
    };
    spinner.finish_and_clear();

    let spec = QuerySpec::new(dataset, start_year, end_year, boundary_value)?;
    let orchestrator = QueryOrchestrator::new(WorldPopClient::new()?);

    let header = format!(
        "Results for '{}' in {} from {start_year} to {end_year}:",
        dataset.label(),
        city.display()
    );

    let spinner = worldpop_cli_utils::wait_spinner(
        multi,
        "Waiting for the remote tasks to finish (ctrl-c to cancel)...",
    );

    // Cancel polling on ctrl-c instead of killing the whole program, so
    // the menu loop survives an abandoned query.
    let cancel = CancellationToken::new();
    let result = tokio::select! {
        result = orchestrator.run_query(&spec, &cancel) => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err(QueryError::Cancelled)
        }
    };
    spinner.finish_and_clear();

    match result {
        Ok(outcome) => {
            if !outcome.missing_years.is_empty() {
                println!(
                    "No task could be created for years: {:?}",
                    outcome.missing_years
                );
            }
            if outcome.is_empty() {
                println!(
                    "No data can be obtained for '{}' in {} from {start_year} to {end_year}.",
                    dataset.label(),
                    city.display()
                );
                return Ok(None);
            }

            println!();
            println!("{header}");
            print_results(&outcome);

            Ok(Some(CompletedQuery {
                city: city.display(),
                dataset,
                start_year,
                end_year,
                outcome,
            }))
        }
        Err(QueryError::Cancelled) => {
            println!("Query cancelled.");
            Ok(None)
        }
        Err(e @ QueryError::OversizedBoundary { .. }) => {
            println!("{e}");
            Ok(None)
        }
        Err(e) => {
            log::error!("Query failed: {e}");
            println!("Query failed: {e}");
            Ok(None)
        }
    }
}

/// Prints the per-year results, one block per year.
fn print_results(outcome: &QueryOutcome) {
    for (year, value) in &outcome.results {
        match value {
            YearValue::Total(total) => println!("  * {year}: {total}"),
            YearValue::Pyramid(buckets) => {
                println!("  * {year}:");
                for bucket in buckets {
                    println!(
                        "      [{:>2}] {:>7}  male: {:>12.1}  female: {:>12.1}",
                        bucket.class_index, bucket.age_range, bucket.male, bucket.female
                    );
                }
            }
        }
    }
}
