#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive CLI for querying WorldPop population data over U.S. city
//! boundaries.
//!
//! Presents a menu-driven interface using `dialoguer`: pick a city from the
//! boundary catalog, pick a dataset (total population or age/sex
//! structures), run the query over a year range, and optionally export the
//! results to CSV.
//!
//! Uses `indicatif-log-bridge` (via [`worldpop_cli_utils::init_logger`]) to
//! route `log` output around the polling spinner so log lines and the
//! spinner never fight for the terminal.

mod export;
mod run;
mod select;

use dialoguer::Select;
use worldpop_query_models::DatasetKind;

/// Top-level menu actions.
enum Action {
    ChooseCity,
    ChooseDataset,
    RunQuery,
    ExportResults,
    Exit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::ChooseCity,
        Self::ChooseDataset,
        Self::RunQuery,
        Self::ExportResults,
        Self::Exit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::ChooseCity => "Choose a city",
            Self::ChooseDataset => "Choose the variable to be determined",
            Self::RunQuery => "Execute query",
            Self::ExportResults => "Export results to file",
            Self::Exit => "Exit",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = worldpop_cli_utils::init_logger();
    let client = reqwest::Client::builder()
        .user_agent(concat!("worldpop-query/", env!("CARGO_PKG_VERSION")))
        .build()?;

    println!("WorldPop Query Tool");
    println!();

    let mut selected_city: Option<select::SelectedCity> = None;
    let mut selected_dataset: Option<DatasetKind> = None;
    let mut last_query: Option<run::CompletedQuery> = None;

    loop {
        println!();
        let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
        let idx = Select::new()
            .with_prompt("Choose an option")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::ChooseCity => {
                selected_city = select::choose_city(&client).await?;
            }
            Action::ChooseDataset => {
                if selected_city.is_none() {
                    println!("Please choose a city first.");
                    continue;
                }
                selected_dataset = Some(select::choose_dataset()?);
            }
            Action::RunQuery => {
                let (Some(city), Some(dataset)) = (&selected_city, selected_dataset) else {
                    println!("Please choose a city and a variable first.");
                    continue;
                };
                if let Some(completed) = run::run_query_flow(&client, &multi, city, dataset).await?
                {
                    last_query = Some(completed);
                }
            }
            Action::ExportResults => {
                let Some(query) = &last_query else {
                    println!("No results to export yet. Run a query first.");
                    continue;
                };
                export::export_interactive(query)?;
            }
            Action::Exit => {
                println!("Goodbye.");
                return Ok(());
            }
        }
    }
}
