//! Outcome of a reconciliation sweep

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// One entity the sweep could not reconcile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub entity: String,
    pub message: String,
    /// Whether the next sweep may succeed without intervention
    pub retryable: bool,
}

/// Counters and failures collected over one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub as_of: NaiveDate,
    pub residents_checked: usize,
    pub profiles_corrected: usize,
    pub households_checked: usize,
    pub aggregates_corrected: usize,
    /// Entities removed mid-sweep or not reached before cancellation
    pub skipped: usize,
    pub cancelled: bool,
    pub errors: Vec<EntityFailure>,
    pub elapsed: Duration,
}

impl ReconciliationReport {
    #[must_use]
    pub const fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            residents_checked: 0,
            profiles_corrected: 0,
            households_checked: 0,
            aggregates_corrected: 0,
            skipped: 0,
            cancelled: false,
            errors: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Total derived records rewritten
    #[must_use]
    pub const fn corrections(&self) -> usize {
        self.profiles_corrected + self.aggregates_corrected
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.corrections() == 0 && self.errors.is_empty()
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reconciliation as of {}", self.as_of)?;
        writeln!(
            f,
            "  Residents:  {} checked, {} profiles corrected",
            self.residents_checked, self.profiles_corrected
        )?;
        writeln!(
            f,
            "  Households: {} checked, {} aggregates corrected",
            self.households_checked, self.aggregates_corrected
        )?;
        writeln!(f, "  Skipped:    {}", self.skipped)?;
        writeln!(f, "  Errors:     {}", self.errors.len())?;
        if self.cancelled {
            writeln!(f, "  Cancelled before completion")?;
        }
        write!(f, "  Elapsed:    {:?}", self.elapsed)
    }
}
