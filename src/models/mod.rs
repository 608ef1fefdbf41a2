//! Domain models
//!
//! Raw registry facts (residents, households, memberships, migration records)
//! and the records derived from them.

pub mod derived;
pub mod household;
pub mod resident;
pub mod types;

pub use derived::{HouseholdAggregate, IncomeClass, SectoralProfile};
pub use household::{ActiveMember, Household, HouseholdMembership, ResidentRef};
pub use resident::{MigrationRecord, RegistrationFlags, ResidentFacts};
pub use types::{
    Centavos, EducationStatus, EducationalAttainment, EmploymentStatus, HouseholdId,
    Relationship, ResidentId,
};
