//! Configuration for the consistency engine.
//!
//! Classification bands and income brackets are deployment policy and are
//! injected here rather than hard-coded in the classifier or aggregator.

use crate::algorithm::income::IncomeBracketTable;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Age bands and inclusion rules for sectoral flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationPolicy {
    /// Count `underemployed` as labor-force employed
    pub count_underemployed_as_employed: bool,
    /// Minimum age for senior citizen status
    pub senior_citizen_age: u32,
    /// Inclusive age band for out-of-school children
    pub out_of_school_children_ages: (u32, u32),
    /// Inclusive age band for out-of-school youth (15-24 or 16-24 depending on deployment)
    pub out_of_school_youth_ages: (u32, u32),
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            count_underemployed_as_employed: false,
            senior_citizen_age: 60,
            out_of_school_children_ages: (6, 14),
            out_of_school_youth_ages: (15, 24),
        }
    }
}

impl ClassificationPolicy {
    fn validate(&self) -> Result<()> {
        let (osc_min, osc_max) = self.out_of_school_children_ages;
        let (osy_min, osy_max) = self.out_of_school_youth_ages;
        if osc_min > osc_max || osy_min > osy_max {
            return Err(RegistryError::Config(
                "age bands must have min <= max".to_string(),
            ));
        }
        if osy_min <= osc_max {
            return Err(RegistryError::Config(format!(
                "out-of-school youth band {osy_min}-{osy_max} overlaps children band {osc_min}-{osc_max}"
            )));
        }
        Ok(())
    }
}

/// Bounded exponential backoff for retryable failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first; 1 disables retry
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 25,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Backoff before retry number `attempt` (1-based), before jitter
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Settings for the reconciliation sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Seconds between scheduled sweeps
    pub interval_secs: u64,
    /// Reconcile independent entities on a thread pool
    pub parallel: bool,
    /// Pool size, defaults to the number of CPUs
    pub threads: Option<usize>,
    /// Show a progress bar while sweeping
    pub show_progress: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 24 * 60 * 60,
            parallel: true,
            threads: None,
            show_progress: false,
        }
    }
}

impl ReconcileConfig {
    /// Effective thread count for parallel sweeps
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration for the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Income bracket table used for household income class
    pub income_brackets: IncomeBracketTable,
    /// Sectoral classification policy
    pub classification: ClassificationPolicy,
    /// How long to wait for a household lock before giving up
    pub lock_timeout_ms: u64,
    /// Retry policy for contention and transient store failures
    pub retry: RetryPolicy,
    /// Reconciliation sweep settings
    pub reconcile: ReconcileConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            income_brackets: IncomeBracketTable::default(),
            classification: ClassificationPolicy::default(),
            lock_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RegistryError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            RegistryError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.classification.validate()?;
        if self.retry.max_attempts == 0 {
            return Err(RegistryError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.lock_timeout_ms == 0 {
            return Err(RegistryError::Config(
                "lock_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engine Configuration:")?;
        writeln!(f, "  Income Brackets:")?;
        write!(f, "{}", self.income_brackets)?;
        let policy = &self.classification;
        writeln!(f, "  Senior Citizen Age: {}", policy.senior_citizen_age)?;
        writeln!(
            f,
            "  Out-of-School Children Ages: {}-{}",
            policy.out_of_school_children_ages.0, policy.out_of_school_children_ages.1
        )?;
        writeln!(
            f,
            "  Out-of-School Youth Ages: {}-{}",
            policy.out_of_school_youth_ages.0, policy.out_of_school_youth_ages.1
        )?;
        writeln!(
            f,
            "  Underemployed Counts as Employed: {}",
            policy.count_underemployed_as_employed
        )?;
        writeln!(f, "  Lock Timeout: {}ms", self.lock_timeout_ms)?;
        writeln!(f, "  Retry Attempts: {}", self.retry.max_attempts)?;
        writeln!(f, "  Reconcile Interval: {}s", self.reconcile.interval_secs)?;
        writeln!(f, "  Parallel Reconcile: {}", self.reconcile.parallel)?;
        Ok(())
    }
}
