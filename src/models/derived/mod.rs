//! Derived records
//!
//! Records owned by the engine. They are always recomputed wholesale from
//! current facts and never edited by hand.

pub mod household;
pub mod sectoral;

pub use household::{HouseholdAggregate, IncomeClass};
pub use sectoral::SectoralProfile;
