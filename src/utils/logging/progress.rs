//! Progress reporting for reconciliation sweeps, using the indicatif crate.

use indicatif::{ProgressBar, ProgressStyle};

/// Template for sweep progress bars
pub const SWEEP_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({per_sec}) {msg}";

/// Create a progress bar for a sweep over `length` entities
///
/// Returns a hidden bar when `visible` is false so callers can tick it
/// unconditionally.
#[must_use]
pub fn create_sweep_progress_bar(length: u64, description: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(length);
    if let Ok(style) = ProgressStyle::default_bar().template(SWEEP_TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(description.to_string());
    pb
}

/// Finish a progress bar with an optional completion message
pub fn finish_progress_bar(pb: &ProgressBar, message: Option<&str>) {
    match message {
        Some(msg) => pb.finish_with_message(msg.to_string()),
        None => pb.finish(),
    }
}
