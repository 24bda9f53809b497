//! Command implementations

pub mod bump;

pub mod doctor;

pub mod info;

pub mod parsers;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Start a spinner on stderr, or a hidden one when `visible` is false.
///
/// Callers must `finish_and_clear` before printing to stdout.
pub fn spinner(visible: bool, message: &'static str) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
