//! Fact store contracts
//!
//! The engine reads registry facts and writes derived records only through
//! these traits. A [`Transaction`] is an all-or-nothing unit of work: reads
//! observe committed state plus the transaction's own staged writes, and
//! dropping a transaction without calling [`Transaction::commit`] discards
//! every staged write.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::RegistrySnapshot;

use crate::error::Result;
use crate::models::{
    ActiveMember, Household, HouseholdAggregate, HouseholdId, HouseholdMembership,
    MigrationRecord, ResidentFacts, ResidentId, ResidentRef, SectoralProfile,
};
use chrono::NaiveDate;

/// Read access to facts and derived records
pub trait FactReader {
    /// Current facts for a resident, `NotFound` if absent
    fn get_resident_facts(&self, id: &ResidentId) -> Result<ResidentFacts>;

    /// Whether the resident has a migration record
    fn has_migration_record(&self, id: &ResidentId) -> Result<bool>;

    /// Household the resident is an active member of, if any
    fn get_active_membership(&self, id: &ResidentId) -> Result<Option<HouseholdId>>;

    /// Ids of a household's active members, sorted
    fn active_member_ids(&self, household: &HouseholdId) -> Result<Vec<ResidentId>>;

    /// Active members with salary and current sectoral profile
    ///
    /// Fails with `Validation` if a member has no stored profile yet.
    fn get_active_members(&self, household: &HouseholdId) -> Result<Vec<ActiveMember>>;

    /// Household record, `NotFound` if absent
    fn get_household(&self, household: &HouseholdId) -> Result<Household>;

    /// Designated head of a household, `NotFound` if the household is absent
    fn get_head(&self, household: &HouseholdId) -> Result<Option<ResidentRef>>;

    fn household_exists(&self, household: &HouseholdId) -> Result<bool>;

    fn get_sectoral_profile(&self, id: &ResidentId) -> Result<Option<SectoralProfile>>;

    fn get_household_aggregate(&self, household: &HouseholdId)
    -> Result<Option<HouseholdAggregate>>;

    /// All resident ids, sorted
    fn resident_ids(&self) -> Result<Vec<ResidentId>>;

    /// All household ids, sorted
    fn household_ids(&self) -> Result<Vec<HouseholdId>>;
}

/// Fact mutations raised by the surrounding application
///
/// Exposed on the transaction so a mutation and the recomputation it
/// triggers commit or roll back together.
pub trait FactWriter {
    /// Insert or replace a resident's facts
    fn put_resident(&mut self, facts: ResidentFacts) -> Result<()>;

    /// Remove a resident with its migration record and memberships
    fn delete_resident(&mut self, id: &ResidentId) -> Result<()>;

    fn put_migration_record(&mut self, record: MigrationRecord) -> Result<()>;

    fn delete_migration_record(&mut self, id: &ResidentId) -> Result<()>;

    fn put_household(&mut self, household: Household) -> Result<()>;

    /// Remove a household with all of its memberships
    fn delete_household(&mut self, id: &HouseholdId) -> Result<()>;

    /// Insert or replace a membership link
    fn put_membership(&mut self, membership: HouseholdMembership) -> Result<()>;

    /// Mark a membership inactive as of `move_out`
    ///
    /// Fails with `Validation` if the resident has no link to the household.
    fn deactivate_membership(
        &mut self,
        household: &HouseholdId,
        resident: &ResidentId,
        move_out: NaiveDate,
    ) -> Result<()>;
}

/// Atomic unit of work over facts and derived records
pub trait Transaction: FactReader + FactWriter {
    fn save_sectoral_profile(&mut self, profile: SectoralProfile) -> Result<()>;

    fn save_household_aggregate(&mut self, aggregate: HouseholdAggregate) -> Result<()>;

    fn delete_sectoral_profile(&mut self, id: &ResidentId) -> Result<()>;

    fn delete_household_aggregate(&mut self, household: &HouseholdId) -> Result<()>;

    /// Make every staged write visible at once
    ///
    /// On error nothing is applied.
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Source of transactions
pub trait FactStore: Send + Sync {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>>;
}
