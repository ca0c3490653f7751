//! City and dataset selection prompts.
//!
//! Mirrors the catalog's two-level structure: the user narrows states by
//! first letter, picks a state code, narrows cities by first letter, then
//! picks a city by prefix.

use dialoguer::{Input, Select};
use worldpop_catalog::{CityCatalog, CityInfo};
use worldpop_query_models::DatasetKind;

/// A city the user picked, with enough context for result headers.
#[derive(Debug, Clone)]
pub struct SelectedCity {
    /// Display form of the state (e.g. "NY: New York").
    pub state: String,
    /// The catalog entry for the city.
    pub city: CityInfo,
}

impl SelectedCity {
    /// "City, ST: State" header form.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} ({})", self.city.display_name(), self.state)
    }
}

/// Walks the user through choosing a state and a city.
///
/// Returns `None` if any step finds no match; the caller keeps the previous
/// selection in that case.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or a prompt fails.
pub async fn choose_city(
    client: &reqwest::Client,
) -> Result<Option<SelectedCity>, Box<dyn std::error::Error>> {
    let catalog = CityCatalog::load(client).await?;

    let Some(state_code) = choose_state(&catalog)? else {
        return Ok(None);
    };
    let state_display = catalog
        .state_by_code(&state_code)
        .map(ToString::to_string)
        .unwrap_or_else(|| state_code.to_uppercase());

    let first_letter: String = Input::new()
        .with_prompt("Enter the first letter of a city in that state")
        .interact_text()?;
    let first_letter = first_letter.trim().to_lowercase();

    let cities = catalog.cities_starting_with(&state_code, &first_letter)?;
    if cities.is_empty() {
        println!("No cities found starting with '{first_letter}'. Try again.");
        return Ok(None);
    }

    println!();
    println!("Cities starting with '{first_letter}':");
    for city in &cities {
        println!("  {}", worldpop_catalog::title_case(city));
    }

    let search: String = Input::new()
        .with_prompt("Enter the first letters of your chosen city")
        .interact_text()?;

    let Some(city) = catalog.find_city(&state_code, search.trim())? else {
        println!("No city found matching '{}'. Try again.", search.trim());
        return Ok(None);
    };

    let selected = SelectedCity {
        state: state_display,
        city: city.clone(),
    };
    println!("You chose: {}", selected.display());
    Ok(Some(selected))
}

/// Prompts for a state by first letter, then by code.
fn choose_state(catalog: &CityCatalog) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let first_letter: String = Input::new()
        .with_prompt("Enter the first letter of a U.S. state")
        .interact_text()?;
    let first_letter = first_letter.trim().to_uppercase();

    let states = catalog.states_starting_with(&first_letter);
    if states.is_empty() {
        println!("No states found starting with '{first_letter}'. Try again.");
        return Ok(None);
    }

    println!();
    println!("States starting with '{first_letter}':");
    for state in &states {
        println!("  {state}");
    }

    let code: String = Input::new()
        .with_prompt("Enter the code of your chosen state")
        .interact_text()?;
    let code = code.trim().to_lowercase();

    if catalog.state_by_code(&code).is_none() {
        println!("No state found with code '{code}'. Try again.");
        return Ok(None);
    }

    Ok(Some(code))
}

/// Prompts for the dataset to query.
///
/// # Errors
///
/// Returns an error if the prompt fails.
pub fn choose_dataset() -> Result<DatasetKind, Box<dyn std::error::Error>> {
    let labels: Vec<&str> = DatasetKind::ALL.iter().map(|kind| kind.label()).collect();
    let idx = Select::new()
        .with_prompt("Available variables")
        .items(&labels)
        .default(0)
        .interact()?;

    let dataset = DatasetKind::ALL[idx];
    println!("Variable '{}' selected.", dataset.label());
    Ok(dataset)
}
