//! Recomputation coordinator
//!
//! Reacts to fact changes by recomputing the derived records that depend on
//! them, along the edge resident facts -> sectoral profile -> household
//! aggregate. Each change is handled in one transaction: household and
//! resident locks are taken first, then the triggering mutation (if any) is
//! applied, the members of every household about to be rebuilt are locked,
//! profiles are recomputed and saved, and only then are dependent aggregates
//! rebuilt, so an aggregate always reads the profiles written before it. Any
//! error drops the transaction and nothing from the attempt becomes visible.

pub mod locks;
pub mod retry;

pub use locks::{LockGuard, LockTable};
pub use retry::with_retry;

use crate::algorithm::{HouseholdAggregator, SectoralClassifier};
use crate::config::{EngineConfig, RetryPolicy};
use crate::error::{EntityRef, RegistryError, Result};
use crate::models::{HouseholdAggregate, HouseholdId, ResidentId, SectoralProfile};
use crate::store::{FactReader, FactStore, FactWriter, Transaction};
use chrono::NaiveDate;
use log::debug;
use smallvec::{SmallVec, smallvec};
use std::fmt;

/// A change to registry facts that derived records depend on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactChange {
    /// A resident's facts were created or edited
    ResidentFacts(ResidentId),
    /// A resident's migration record was created or deleted
    MigrationRecord(ResidentId),
    /// A membership of this household was added, removed or edited
    HouseholdMembership(HouseholdId),
    /// A resident moved from one household to another
    MembershipTransfer {
        resident: ResidentId,
        from: HouseholdId,
        to: HouseholdId,
    },
    /// A resident was removed from the registry
    ResidentDeleted(ResidentId),
    /// A household was removed from the registry
    HouseholdDeleted(HouseholdId),
}

impl fmt::Display for FactChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResidentFacts(id) => write!(f, "resident {id} facts changed"),
            Self::MigrationRecord(id) => write!(f, "resident {id} migration record changed"),
            Self::HouseholdMembership(id) => write!(f, "household {id} membership changed"),
            Self::MembershipTransfer { resident, from, to } => {
                write!(f, "resident {resident} transferred from {from} to {to}")
            }
            Self::ResidentDeleted(id) => write!(f, "resident {id} deleted"),
            Self::HouseholdDeleted(id) => write!(f, "household {id} deleted"),
        }
    }
}

/// Derived records written by one committed change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeOutcome {
    pub profiles: Vec<SectoralProfile>,
    pub aggregates: Vec<HouseholdAggregate>,
}

impl RecomputeOutcome {
    /// Aggregate written for `household`, if any
    #[must_use]
    pub fn aggregate(&self, household: &HouseholdId) -> Option<&HouseholdAggregate> {
        self.aggregates.iter().find(|a| &a.household_id == household)
    }
}

/// Stored derived record next to a freshly computed one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift<T> {
    pub stored: Option<T>,
    pub fresh: T,
    /// Whether the stored record differs from the fresh one
    pub drifted: bool,
}

type LockScope = SmallVec<[EntityRef; 2]>;

/// Keeps sectoral profiles and household aggregates in step with facts
#[derive(Debug)]
pub struct RecomputationCoordinator<S: FactStore> {
    store: S,
    classifier: SectoralClassifier,
    aggregator: HouseholdAggregator,
    locks: LockTable,
    retry: RetryPolicy,
}

impl<S: FactStore> RecomputationCoordinator<S> {
    /// Create a coordinator over `store` configured by `config`
    pub fn new(store: S, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            classifier: SectoralClassifier::new(config.classification.clone()),
            aggregator: HouseholdAggregator::new(config.income_brackets.clone()),
            locks: LockTable::new(config.lock_timeout()),
            retry: config.retry.clone(),
        })
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn classifier(&self) -> &SectoralClassifier {
        &self.classifier
    }

    #[must_use]
    pub const fn aggregator(&self) -> &HouseholdAggregator {
        &self.aggregator
    }

    #[must_use]
    pub const fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Recompute after a resident's facts changed
    pub fn on_resident_facts_changed(
        &self,
        resident: &ResidentId,
        as_of: NaiveDate,
    ) -> Result<RecomputeOutcome> {
        self.apply(&FactChange::ResidentFacts(resident.clone()), as_of, |_| Ok(()))
    }

    /// Recompute after a resident's migration record was created or deleted
    pub fn on_migration_record_changed(
        &self,
        resident: &ResidentId,
        as_of: NaiveDate,
    ) -> Result<RecomputeOutcome> {
        self.apply(&FactChange::MigrationRecord(resident.clone()), as_of, |_| Ok(()))
    }

    /// Recompute a household's aggregate after its membership changed
    pub fn on_household_membership_changed(
        &self,
        household: &HouseholdId,
        as_of: NaiveDate,
    ) -> Result<RecomputeOutcome> {
        self.apply(
            &FactChange::HouseholdMembership(household.clone()),
            as_of,
            |_| Ok(()),
        )
    }

    /// Recompute both households of a transfer
    pub fn on_membership_transferred(
        &self,
        resident: &ResidentId,
        from: &HouseholdId,
        to: &HouseholdId,
        as_of: NaiveDate,
    ) -> Result<RecomputeOutcome> {
        let change = FactChange::MembershipTransfer {
            resident: resident.clone(),
            from: from.clone(),
            to: to.clone(),
        };
        self.apply(&change, as_of, |_| Ok(()))
    }

    /// Delete a resident, drop its profile and recompute its former household
    ///
    /// A household the resident headed is left without a head.
    pub fn on_resident_deleted(
        &self,
        resident: &ResidentId,
        as_of: NaiveDate,
    ) -> Result<RecomputeOutcome> {
        self.apply(&FactChange::ResidentDeleted(resident.clone()), as_of, |tx| {
            match tx.get_resident_facts(resident) {
                Ok(_) => {}
                Err(RegistryError::NotFound { .. }) => return Ok(()),
                Err(e) => return Err(e),
            }
            if let Some(household) = tx.get_active_membership(resident)? {
                let mut record = tx.get_household(&household)?;
                if record.head.as_ref() == Some(resident) {
                    record.head = None;
                    tx.put_household(record)?;
                }
            }
            tx.delete_resident(resident)
        })
    }

    /// Drop a deleted household's aggregate
    pub fn on_household_deleted(
        &self,
        household: &HouseholdId,
        as_of: NaiveDate,
    ) -> Result<RecomputeOutcome> {
        self.apply(&FactChange::HouseholdDeleted(household.clone()), as_of, |tx| {
            if tx.household_exists(household)? {
                tx.delete_household(household)
            } else {
                Ok(())
            }
        })
    }

    /// Apply `mutation` and recompute everything `change` affects, atomically
    ///
    /// The mutation runs inside the same transaction as the recompute, after
    /// the household locks are held. Residents the mutation brings into a
    /// household are locked before that household is rebuilt. If either
    /// fails, neither is committed.
    /// Retryable failures re-run the whole attempt, mutation included.
    pub fn apply<F>(
        &self,
        change: &FactChange,
        as_of: NaiveDate,
        mut mutation: F,
    ) -> Result<RecomputeOutcome>
    where
        F: FnMut(&mut dyn Transaction) -> Result<()>,
    {
        with_retry(&self.retry, &change.to_string(), || {
            self.apply_once(change, as_of, &mut mutation)
        })
    }

    fn apply_once(
        &self,
        change: &FactChange,
        as_of: NaiveDate,
        mutation: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>,
    ) -> Result<RecomputeOutcome> {
        let scope = self.lock_scope(change)?;
        let mut guard = self.locks.acquire(&scope)?;
        let mut tx = self.store.begin()?;
        mutation(tx.as_mut())?;

        let mut outcome = RecomputeOutcome::default();
        match change {
            FactChange::ResidentFacts(resident) | FactChange::MigrationRecord(resident) => {
                outcome
                    .profiles
                    .push(self.recompute_resident(tx.as_mut(), resident, as_of)?);
                if let Some(household) = tx.get_active_membership(resident)? {
                    ensure_covered(&guard, &household, resident)?;
                    outcome
                        .aggregates
                        .push(self.recompute_household(tx.as_mut(), &household, as_of)?);
                }
            }
            FactChange::HouseholdMembership(household) => {
                self.lock_members(&mut guard, tx.as_ref(), household)?;
                outcome
                    .aggregates
                    .push(self.recompute_household(tx.as_mut(), household, as_of)?);
            }
            FactChange::MembershipTransfer { resident, from, to } => {
                if tx.get_active_membership(resident)?.as_ref() != Some(to) {
                    return Err(RegistryError::invalid_resident(
                        resident,
                        format!("not an active member of {to} after transfer from {from}"),
                    ));
                }
                let mut members = Vec::new();
                for household in [from, to] {
                    if tx.household_exists(household)? {
                        members.extend(tx.active_member_ids(household)?);
                    }
                }
                guard.extend_residents(&members)?;
                for household in [from, to] {
                    if tx.household_exists(household)? {
                        outcome
                            .aggregates
                            .push(self.recompute_household(tx.as_mut(), household, as_of)?);
                    }
                }
            }
            FactChange::ResidentDeleted(resident) => {
                if tx.get_resident_facts(resident).is_ok() {
                    return Err(RegistryError::invalid_resident(
                        resident,
                        "still registered after deletion",
                    ));
                }
                tx.delete_sectoral_profile(resident)?;
                for household in scope_households(&scope) {
                    if tx.household_exists(household)? {
                        outcome
                            .aggregates
                            .push(self.recompute_household(tx.as_mut(), household, as_of)?);
                    }
                }
            }
            FactChange::HouseholdDeleted(household) => {
                if tx.household_exists(household)? {
                    return Err(RegistryError::invalid_household(
                        household,
                        "still registered after deletion",
                    ));
                }
                tx.delete_household_aggregate(household)?;
            }
        }

        tx.commit()?;
        drop(guard);
        debug!(
            "Committed {change}: {} profiles, {} aggregates",
            outcome.profiles.len(),
            outcome.aggregates.len()
        );
        Ok(outcome)
    }

    /// Entities whose locks `change` needs before its mutation runs
    ///
    /// A resident change locks the resident and the household it belongs to
    /// in committed state. Household changes lock their households here and
    /// their members once the mutation has run.
    fn lock_scope(&self, change: &FactChange) -> Result<LockScope> {
        match change {
            FactChange::ResidentFacts(resident)
            | FactChange::MigrationRecord(resident)
            | FactChange::ResidentDeleted(resident) => {
                let tx = self.store.begin()?;
                Ok(resident_scope(resident, tx.get_active_membership(resident)?))
            }
            FactChange::HouseholdMembership(household) | FactChange::HouseholdDeleted(household) => {
                Ok(smallvec![EntityRef::Household(household.clone())])
            }
            FactChange::MembershipTransfer { from, to, .. } => Ok(smallvec![
                EntityRef::Household(from.clone()),
                EntityRef::Household(to.clone())
            ]),
        }
    }

    /// Lock every active member of `household` as `tx` sees it
    fn lock_members(
        &self,
        guard: &mut LockGuard<'_>,
        tx: &dyn Transaction,
        household: &HouseholdId,
    ) -> Result<()> {
        guard.extend_residents(&tx.active_member_ids(household)?)
    }

    /// Lock a resident and the household it currently belongs to
    ///
    /// Re-reads the membership once the locks are held and reports a
    /// conflict if the resident moved in between.
    fn lock_resident(
        &self,
        resident: &ResidentId,
    ) -> Result<(LockGuard<'_>, Option<HouseholdId>)> {
        let before = self.store.begin()?.get_active_membership(resident)?;
        let scope = resident_scope(resident, before.clone());
        let guard = self.locks.acquire(&scope)?;
        let after = self.store.begin()?.get_active_membership(resident)?;
        if after != before {
            return Err(RegistryError::Conflict(format!(
                "resident {resident} changed household while waiting for its lock"
            )));
        }
        Ok((guard, after))
    }

    /// Classify a resident from current facts and save the profile
    fn recompute_resident(
        &self,
        tx: &mut dyn Transaction,
        resident: &ResidentId,
        as_of: NaiveDate,
    ) -> Result<SectoralProfile> {
        let profile = self.fresh_profile(tx, resident, as_of)?;
        tx.save_sectoral_profile(profile.clone())?;
        debug!("Recomputed sectoral profile for resident {resident}");
        Ok(profile)
    }

    fn fresh_profile(
        &self,
        tx: &dyn Transaction,
        resident: &ResidentId,
        as_of: NaiveDate,
    ) -> Result<SectoralProfile> {
        let facts = tx.get_resident_facts(resident)?;
        facts.validate(as_of)?;
        let has_migration = tx.has_migration_record(resident)?;
        Ok(self.classifier.classify(&facts, has_migration, as_of))
    }

    /// Profile every active member that has none yet
    ///
    /// Returns how many profiles were created.
    fn ensure_member_profiles(
        &self,
        tx: &mut dyn Transaction,
        household: &HouseholdId,
        as_of: NaiveDate,
    ) -> Result<usize> {
        let mut created = 0;
        for member in tx.active_member_ids(household)? {
            if tx.get_sectoral_profile(&member)?.is_none() {
                self.recompute_resident(tx, &member, as_of)?;
                created += 1;
            }
        }
        Ok(created)
    }

    fn fresh_aggregate(
        &self,
        tx: &dyn Transaction,
        household: &HouseholdId,
    ) -> Result<HouseholdAggregate> {
        let head = tx.get_head(household)?;
        let members = tx.get_active_members(household)?;
        self.aggregator.aggregate(household, &members, head.as_ref())
    }

    /// Rebuild a household's aggregate from its full active membership
    fn recompute_household(
        &self,
        tx: &mut dyn Transaction,
        household: &HouseholdId,
        as_of: NaiveDate,
    ) -> Result<HouseholdAggregate> {
        self.ensure_member_profiles(tx, household, as_of)?;
        let aggregate = self.fresh_aggregate(tx, household)?;
        tx.save_household_aggregate(aggregate.clone())?;
        debug!(
            "Recomputed aggregate for household {household}: {} members, {} migrants",
            aggregate.member_count, aggregate.migrant_count
        );
        Ok(aggregate)
    }

    /// Compare a resident's stored profile with a fresh one without writing
    pub fn verify_resident(
        &self,
        resident: &ResidentId,
        as_of: NaiveDate,
    ) -> Result<Drift<SectoralProfile>> {
        let tx = self.store.begin()?;
        let fresh = self.fresh_profile(tx.as_ref(), resident, as_of)?;
        let stored = tx.get_sectoral_profile(resident)?;
        let drifted = !stored.as_ref().is_some_and(|s| s.same_flags(&fresh));
        Ok(Drift {
            stored,
            fresh,
            drifted,
        })
    }

    /// Compare a household's stored aggregate with a fresh one without writing
    ///
    /// Uses the members' stored profiles, so run after residents are current.
    pub fn verify_household(
        &self,
        household: &HouseholdId,
    ) -> Result<Drift<HouseholdAggregate>> {
        let tx = self.store.begin()?;
        let fresh = self.fresh_aggregate(tx.as_ref(), household)?;
        let stored = tx.get_household_aggregate(household)?;
        let drifted = stored.as_ref() != Some(&fresh);
        Ok(Drift {
            stored,
            fresh,
            drifted,
        })
    }

    /// Bring one resident's profile up to date; returns whether it changed
    pub fn reconcile_resident(&self, resident: &ResidentId, as_of: NaiveDate) -> Result<bool> {
        with_retry(&self.retry, "reconcile resident", || {
            let (_guard, _household) = self.lock_resident(resident)?;
            let mut tx = self.store.begin()?;
            let fresh = self.fresh_profile(tx.as_ref(), resident, as_of)?;
            let stored = tx.get_sectoral_profile(resident)?;
            if stored.is_some_and(|s| s.same_flags(&fresh)) {
                return Ok(false);
            }
            tx.save_sectoral_profile(fresh)?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Bring one household's aggregate up to date; returns whether it changed
    ///
    /// A household deleted since the sweep listed it is skipped.
    pub fn reconcile_household(&self, household: &HouseholdId, as_of: NaiveDate) -> Result<bool> {
        with_retry(&self.retry, "reconcile household", || {
            let mut guard = self
                .locks
                .acquire(&[EntityRef::Household(household.clone())])?;
            let mut tx = self.store.begin()?;
            if !tx.household_exists(household)? {
                return Ok(false);
            }
            self.lock_members(&mut guard, tx.as_ref(), household)?;
            let created = self.ensure_member_profiles(tx.as_mut(), household, as_of)?;
            let fresh = self.fresh_aggregate(tx.as_ref(), household)?;
            let stored = tx.get_household_aggregate(household)?;
            if created == 0 && stored.as_ref() == Some(&fresh) {
                return Ok(false);
            }
            tx.save_household_aggregate(fresh)?;
            tx.commit()?;
            Ok(true)
        })
    }
}

fn resident_scope(resident: &ResidentId, household: Option<HouseholdId>) -> LockScope {
    household
        .map(EntityRef::Household)
        .into_iter()
        .chain([EntityRef::Resident(resident.clone())])
        .collect()
}

fn scope_households(scope: &LockScope) -> impl Iterator<Item = &HouseholdId> {
    scope.iter().filter_map(|entity| match entity {
        EntityRef::Household(id) => Some(id),
        EntityRef::Resident(_) => None,
    })
}

fn ensure_covered(
    guard: &LockGuard<'_>,
    household: &HouseholdId,
    resident: &ResidentId,
) -> Result<()> {
    if guard.covers(household) {
        Ok(())
    } else {
        Err(RegistryError::Conflict(format!(
            "resident {resident} joined household {household} while its lock was not held"
        )))
    }
}
