//! Derived-state consistency engine for civil-registry records.
//!
//! Keeps per-resident sectoral profiles and per-household aggregates in step
//! with the resident, membership and migration facts they are computed from,
//! both when facts change and, through periodic reconciliation, when only the
//! calendar moves.

pub mod algorithm;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod store;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{ClassificationPolicy, EngineConfig, ReconcileConfig, RetryPolicy};
pub use error::{EntityRef, RegistryError, Result};

// Facts and derived records
pub use models::{
    ActiveMember, Centavos, EducationStatus, EducationalAttainment, EmploymentStatus, Household,
    HouseholdAggregate, HouseholdId, HouseholdMembership, IncomeClass, MigrationRecord,
    RegistrationFlags, Relationship, ResidentFacts, ResidentId, ResidentRef, SectoralProfile,
};

// Computation
pub use algorithm::{HouseholdAggregator, IncomeBracket, IncomeBracketTable, SectoralClassifier};

// Storage
pub use store::{FactReader, FactStore, FactWriter, MemoryStore, RegistrySnapshot, Transaction};

// Recomputation and reconciliation
pub use coordinator::{Drift, FactChange, RecomputationCoordinator, RecomputeOutcome};
pub use reconcile::{
    CancellationToken, ReconciliationReport, ReconciliationScheduler, Reconciler, reconcile_all,
};
