//! Logging utilities
//!
//! Consistent log line formats for operations over registry entities and files.

use std::fmt::Display;
use std::time::Duration;

/// Log an operation start
///
/// # Arguments
/// * `operation` - Description of the operation
/// * `target` - What is being operated on (an entity, a file path, an as-of date)
pub fn log_operation_start(operation: &str, target: impl Display) {
    log::info!("{operation} {target}");
}

/// Log an operation completion
///
/// # Arguments
/// * `operation` - Past-tense verb describing the operation
/// * `target` - What was operated on
/// * `items` - Number of items processed
/// * `elapsed` - Optional elapsed time
pub fn log_operation_complete(
    operation: &str,
    target: impl Display,
    items: usize,
    elapsed: Option<Duration>,
) {
    match elapsed {
        Some(duration) => {
            log::info!("Successfully {operation} {items} items for {target} in {duration:?}");
        }
        None => log::info!("Successfully {operation} {items} items for {target}"),
    }
}

/// Log a warning, optionally naming the entity it concerns
pub fn log_warning(message: &str, target: Option<&dyn Display>) {
    match target {
        Some(target) => log::warn!("{message}: {target}"),
        None => log::warn!("{message}"),
    }
}
