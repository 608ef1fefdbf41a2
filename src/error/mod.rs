//! Error handling for the registry consistency engine.
//!
//! Errors fall into two groups: caller mistakes (`NotFound`, `Validation`,
//! `Config`) which are surfaced immediately, and contention or storage hiccups
//! (`ConcurrencyTimeout`, `Conflict`, transient `Persistence`) which are safe to retry
//! because every recompute replaces the derived record wholesale.

use std::io;
use std::time::Duration;

use crate::models::{HouseholdId, ResidentId};

/// Kind of entity an error or lock refers to
///
/// Households order before residents, which is the order locks are taken in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    /// A household record
    Household(HouseholdId),
    /// A resident record
    Resident(ResidentId),
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resident(id) => write!(f, "resident {id}"),
            Self::Household(id) => write!(f, "household {id}"),
        }
    }
}

/// Specialized error type for registry recomputation
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Referenced resident or household does not exist
    #[error("{entity} not found")]
    NotFound { entity: EntityRef },

    /// Facts are malformed or violate a data-integrity rule
    #[error("validation failed for {entity}: {message}")]
    Validation { entity: EntityRef, message: String },

    /// A household or resident lock could not be acquired in time
    #[error("timed out after {waited:?} waiting for the lock on {entity}")]
    ConcurrencyTimeout { entity: EntityRef, waited: Duration },

    /// Facts moved under a recompute between choosing and taking its locks
    #[error("conflicting concurrent change: {0}")]
    Conflict(String),

    /// The underlying store rejected or failed a write
    #[error("persistence failure: {message}")]
    Persistence { message: String, transient: bool },

    /// Configuration is missing or inconsistent
    #[error("configuration error: {0}")]
    Config(String),

    /// Background task failed to complete
    #[error("background task failed: {0}")]
    Task(String),

    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error decoding or encoding JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Create a not-found error for a resident
    pub fn resident_not_found(id: &ResidentId) -> Self {
        Self::NotFound {
            entity: EntityRef::Resident(id.clone()),
        }
    }

    /// Create a not-found error for a household
    pub fn household_not_found(id: &HouseholdId) -> Self {
        Self::NotFound {
            entity: EntityRef::Household(id.clone()),
        }
    }

    /// Create a validation error attached to a resident
    pub fn invalid_resident(id: &ResidentId, message: impl Into<String>) -> Self {
        Self::Validation {
            entity: EntityRef::Resident(id.clone()),
            message: message.into(),
        }
    }

    /// Create a validation error attached to a household
    pub fn invalid_household(id: &HouseholdId, message: impl Into<String>) -> Self {
        Self::Validation {
            entity: EntityRef::Household(id.clone()),
            message: message.into(),
        }
    }

    /// Create a persistence error that may succeed on retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            transient: true,
        }
    }

    /// Create a persistence error that will not succeed on retry
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            transient: false,
        }
    }

    /// Whether the failed operation may be retried as-is
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ConcurrencyTimeout { .. } | Self::Conflict(_) => true,
            Self::Persistence { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
