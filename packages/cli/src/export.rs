//! CSV export for completed queries.
//!
//! Total-population results export as `year,total_population` rows;
//! pyramid results as `year,class,age,male,female` rows, preserving the
//! server's bucket order within each year.

use std::path::Path;

use dialoguer::Input;
use worldpop_query_models::{DatasetKind, YearValue};

use crate::run::CompletedQuery;

/// Prompts for a file name and writes the query's results to it.
///
/// # Errors
///
/// Returns an error if the prompt or the write fails.
pub fn export_interactive(query: &CompletedQuery) -> Result<(), Box<dyn std::error::Error>> {
    let filename: String = Input::new()
        .with_prompt("Enter the filename to export results (e.g. results.csv)")
        .default("results.csv".to_string())
        .interact_text()?;

    write_csv(filename.trim(), query)?;
    println!(
        "Results for '{}' in {} ({}-{}) exported to {}",
        query.dataset.label(),
        query.city,
        query.start_year,
        query.end_year,
        filename.trim()
    );
    Ok(())
}

/// Writes a completed query to a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or a row cannot be
/// written.
pub fn write_csv(
    path: impl AsRef<Path>,
    query: &CompletedQuery,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_path(path)?;

    match query.dataset {
        DatasetKind::AgeSexStructure => {
            writer.write_record(["year", "class", "age", "male", "female"])?;
            for (year, value) in &query.outcome.results {
                let YearValue::Pyramid(buckets) = value else {
                    continue;
                };
                for bucket in buckets {
                    writer.write_record([
                        year.to_string(),
                        bucket.class_index.to_string(),
                        bucket.age_range.clone(),
                        bucket.male.to_string(),
                        bucket.female.to_string(),
                    ])?;
                }
            }
        }
        DatasetKind::TotalPopulation => {
            writer.write_record(["year", "total_population"])?;
            for (year, value) in &query.outcome.results {
                let YearValue::Total(total) = value else {
                    continue;
                };
                writer.write_record([year.to_string(), total.to_string()])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use worldpop_query_models::{AgeSexBucket, DatasetKind, QueryOutcome};

    use super::*;

    fn completed(outcome: QueryOutcome, dataset: DatasetKind) -> CompletedQuery {
        CompletedQuery {
            city: "New York (NY: New York)".to_string(),
            dataset,
            start_year: 2019,
            end_year: 2020,
            outcome,
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("worldpop-export-{}-{name}", std::process::id()))
    }

    #[test]
    fn exports_totals_one_row_per_year() {
        let mut outcome = QueryOutcome::default();
        outcome.results.insert(2019, YearValue::Total(100.0));
        outcome.results.insert(2020, YearValue::Total(110.5));

        let path = temp_path("totals.csv");
        write_csv(&path, &completed(outcome, DatasetKind::TotalPopulation)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "year,total_population");
        assert_eq!(lines[1], "2019,100");
        assert_eq!(lines[2], "2020,110.5");
    }

    #[test]
    fn exports_pyramid_rows_in_order() {
        let mut outcome = QueryOutcome::default();
        outcome.results.insert(
            2020,
            YearValue::Pyramid(vec![
                AgeSexBucket {
                    class_index: 0,
                    age_range: "0-4".to_string(),
                    male: 10.0,
                    female: 12.0,
                },
                AgeSexBucket {
                    class_index: 1,
                    age_range: "5-9".to_string(),
                    male: 8.0,
                    female: 9.0,
                },
            ]),
        );

        let path = temp_path("pyramid.csv");
        write_csv(&path, &completed(outcome, DatasetKind::AgeSexStructure)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "year,class,age,male,female");
        assert_eq!(lines[1], "2020,0,0-4,10,12");
        assert_eq!(lines[2], "2020,1,5-9,8,9");
    }
}
