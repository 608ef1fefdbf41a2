//! Logging utilities for recomputation and sweep reporting
//!
//! Standardized log lines plus progress bars for long reconciliation sweeps.

pub mod log;
pub mod progress;

pub use log::{log_operation_complete, log_operation_start, log_warning};
pub use progress::{create_sweep_progress_bar, finish_progress_bar};
