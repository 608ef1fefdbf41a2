//! Pure derivation rules
//!
//! Sectoral classification of residents and aggregation of households.
//! Nothing here performs I/O; the coordinator feeds facts in and persists
//! the results.

pub mod household;
pub mod income;
pub mod sectoral;

pub use household::HouseholdAggregator;
pub use income::{IncomeBracket, IncomeBracketTable};
pub use sectoral::SectoralClassifier;
