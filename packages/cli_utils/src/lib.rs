#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the WorldPop query tool.
//!
//! Provides [`init_logger`], which sets up `pretty_env_logger` wrapped in
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while spinners redraw, plus a spinner helper for the polling phase,
//! where the tool can sit for minutes waiting on server-side tasks.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that all spinners must be added to so log
/// lines and progress indicators never fight for the terminal.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    multi
}

/// Creates a steadily ticking spinner with the given message.
///
/// Used while waiting on remote computation tasks; call
/// [`ProgressBar::finish_and_clear`] once the wait is over.
#[must_use]
pub fn wait_spinner(multi: &MultiProgress, message: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new_spinner());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar
}
