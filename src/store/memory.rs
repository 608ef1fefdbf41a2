//! In-process transactional fact store
//!
//! Committed state lives behind a single `RwLock`. A transaction stages its
//! writes privately and reads through them to the latest committed state, so
//! a writer that holds a household lock always sees every earlier commit to
//! that household. Commit applies the staged writes under the write lock,
//! checks the invariants they could break, and undoes them if any fails.

use super::{FactReader, FactStore, FactWriter, Transaction};
use crate::error::{RegistryError, Result};
use crate::models::{
    ActiveMember, Household, HouseholdAggregate, HouseholdId, HouseholdMembership,
    MigrationRecord, ResidentFacts, ResidentId, ResidentRef, SectoralProfile,
};
use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type MembershipKey = (HouseholdId, ResidentId);

/// Committed registry state
#[derive(Debug, Default)]
struct StoreState {
    residents: FxHashMap<ResidentId, ResidentFacts>,
    migrations: FxHashMap<ResidentId, MigrationRecord>,
    households: FxHashMap<HouseholdId, Household>,
    memberships: BTreeMap<MembershipKey, HouseholdMembership>,
    /// Every household a resident has a membership row in, active or not
    by_resident: FxHashMap<ResidentId, BTreeSet<HouseholdId>>,
    profiles: FxHashMap<ResidentId, SectoralProfile>,
    aggregates: FxHashMap<HouseholdId, HouseholdAggregate>,
}

impl StoreState {
    fn set_membership(
        &mut self,
        key: MembershipKey,
        value: Option<HouseholdMembership>,
    ) -> Option<HouseholdMembership> {
        let (household, resident) = key.clone();
        match value {
            Some(membership) => {
                self.by_resident
                    .entry(resident)
                    .or_default()
                    .insert(household);
                self.memberships.insert(key, membership)
            }
            None => {
                if let Some(set) = self.by_resident.get_mut(&resident) {
                    set.remove(&household);
                    if set.is_empty() {
                        self.by_resident.remove(&resident);
                    }
                }
                self.memberships.remove(&key)
            }
        }
    }

    fn active_households_of(&self, resident: &ResidentId) -> Vec<HouseholdId> {
        self.by_resident
            .get(resident)
            .into_iter()
            .flatten()
            .filter(|household| {
                self.memberships
                    .get(&((*household).clone(), resident.clone()))
                    .is_some_and(|m| m.is_active)
            })
            .cloned()
            .collect()
    }

    fn memberships_of(&self, household: &HouseholdId) -> Vec<&HouseholdMembership> {
        self.memberships
            .range((household.clone(), ResidentId::from(""))..)
            .take_while(|((h, _), _)| h == household)
            .map(|(_, m)| m)
            .collect()
    }
}

fn replace<K: Eq + Hash, V>(map: &mut FxHashMap<K, V>, key: K, value: Option<V>) -> Option<V> {
    match value {
        Some(v) => map.insert(key, v),
        None => map.remove(&key),
    }
}

fn overlay<K: Eq + Hash, V: Clone>(
    staged: &FxHashMap<K, Option<V>>,
    committed: &FxHashMap<K, V>,
    key: &K,
) -> Option<V> {
    match staged.get(key) {
        Some(entry) => entry.clone(),
        None => committed.get(key).cloned(),
    }
}

fn overlay_keys<K: Eq + Hash + Ord + Clone, V>(
    staged: &FxHashMap<K, Option<V>>,
    committed: &FxHashMap<K, impl Sized>,
) -> Vec<K> {
    let mut keys: BTreeSet<K> = committed.keys().cloned().collect();
    for (key, value) in staged {
        if value.is_some() {
            keys.insert(key.clone());
        } else {
            keys.remove(key);
        }
    }
    keys.into_iter().collect()
}

/// Staged writes of one transaction; `None` marks a deletion
#[derive(Debug, Default)]
struct Staged {
    residents: FxHashMap<ResidentId, Option<ResidentFacts>>,
    migrations: FxHashMap<ResidentId, Option<MigrationRecord>>,
    households: FxHashMap<HouseholdId, Option<Household>>,
    memberships: BTreeMap<MembershipKey, Option<HouseholdMembership>>,
    profiles: FxHashMap<ResidentId, Option<SectoralProfile>>,
    aggregates: FxHashMap<HouseholdId, Option<HouseholdAggregate>>,
}

impl Staged {
    fn is_empty(&self) -> bool {
        self.residents.is_empty()
            && self.migrations.is_empty()
            && self.households.is_empty()
            && self.memberships.is_empty()
            && self.profiles.is_empty()
            && self.aggregates.is_empty()
    }
}

/// Previous value of a row overwritten during commit
enum Undo {
    Resident(ResidentId, Option<ResidentFacts>),
    Migration(ResidentId, Option<MigrationRecord>),
    Household(HouseholdId, Option<Household>),
    Membership(MembershipKey, Option<HouseholdMembership>),
    Profile(ResidentId, Option<SectoralProfile>),
    Aggregate(HouseholdId, Option<HouseholdAggregate>),
}

/// Thread-safe in-memory registry store
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| RegistryError::permanent("store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| RegistryError::permanent("store lock poisoned"))
    }

    /// Begin a concrete transaction
    pub fn transaction(&self) -> MemoryTransaction<'_> {
        MemoryTransaction {
            store: self,
            staged: Staged::default(),
        }
    }

    /// Number of residents and households currently committed
    pub fn counts(&self) -> Result<(usize, usize)> {
        let state = self.read()?;
        Ok((state.residents.len(), state.households.len()))
    }

    /// Copies of every committed derived record, sorted by id
    pub fn derived_records(&self) -> Result<(Vec<SectoralProfile>, Vec<HouseholdAggregate>)> {
        let state = self.read()?;
        let mut profiles: Vec<_> = state.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.resident_id.cmp(&b.resident_id));
        let mut aggregates: Vec<_> = state.aggregates.values().cloned().collect();
        aggregates.sort_by(|a, b| a.household_id.cmp(&b.household_id));
        Ok((profiles, aggregates))
    }

    /// Copies of every committed fact record, sorted by id
    pub(crate) fn fact_records(
        &self,
    ) -> Result<(
        Vec<ResidentFacts>,
        Vec<Household>,
        Vec<HouseholdMembership>,
        Vec<MigrationRecord>,
    )> {
        let state = self.read()?;
        let mut residents: Vec<_> = state.residents.values().cloned().collect();
        residents.sort_by(|a, b| a.id.cmp(&b.id));
        let mut households: Vec<_> = state.households.values().cloned().collect();
        households.sort_by(|a, b| a.id.cmp(&b.id));
        let memberships = state.memberships.values().cloned().collect();
        let mut migrations: Vec<_> = state.migrations.values().cloned().collect();
        migrations.sort_by(|a, b| a.resident_id.cmp(&b.resident_id));
        Ok((residents, households, memberships, migrations))
    }
}

impl FactStore for MemoryStore {
    fn begin(&self) -> Result<Box<dyn Transaction + '_>> {
        Ok(Box::new(self.transaction()))
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    staged: Staged,
}

impl MemoryTransaction<'_> {
    /// Memberships of a household as seen by this transaction, by resident
    fn memberships_of(
        &self,
        household: &HouseholdId,
    ) -> Result<BTreeMap<ResidentId, HouseholdMembership>> {
        let state = self.store.read()?;
        let mut out: BTreeMap<ResidentId, HouseholdMembership> = state
            .memberships_of(household)
            .into_iter()
            .map(|m| (m.resident_id.clone(), m.clone()))
            .collect();
        drop(state);

        let staged = self
            .staged
            .memberships
            .range((household.clone(), ResidentId::from(""))..)
            .take_while(|((h, _), _)| h == household);
        for ((_, resident), entry) in staged {
            match entry {
                Some(m) => {
                    out.insert(resident.clone(), m.clone());
                }
                None => {
                    out.remove(resident);
                }
            }
        }
        Ok(out)
    }

    /// Every membership key for a resident as seen by this transaction
    fn membership_keys_of(&self, resident: &ResidentId) -> Result<Vec<MembershipKey>> {
        let state = self.store.read()?;
        let mut keys: BTreeSet<MembershipKey> = state
            .by_resident
            .get(resident)
            .into_iter()
            .flatten()
            .map(|h| (h.clone(), resident.clone()))
            .collect();
        drop(state);
        for (key, entry) in &self.staged.memberships {
            if &key.1 == resident {
                if entry.is_some() {
                    keys.insert(key.clone());
                } else {
                    keys.remove(key);
                }
            }
        }
        Ok(keys.into_iter().collect())
    }

    fn membership(&self, key: &MembershipKey) -> Result<Option<HouseholdMembership>> {
        if let Some(entry) = self.staged.memberships.get(key) {
            return Ok(entry.clone());
        }
        Ok(self.store.read()?.memberships.get(key).cloned())
    }
}

impl FactReader for MemoryTransaction<'_> {
    fn get_resident_facts(&self, id: &ResidentId) -> Result<ResidentFacts> {
        let state = self.store.read()?;
        overlay(&self.staged.residents, &state.residents, id)
            .ok_or_else(|| RegistryError::resident_not_found(id))
    }

    fn has_migration_record(&self, id: &ResidentId) -> Result<bool> {
        let state = self.store.read()?;
        Ok(overlay(&self.staged.migrations, &state.migrations, id).is_some())
    }

    fn get_active_membership(&self, id: &ResidentId) -> Result<Option<HouseholdId>> {
        let mut active = Vec::new();
        for key in self.membership_keys_of(id)? {
            if self.membership(&key)?.is_some_and(|m| m.is_active) {
                active.push(key.0);
            }
        }
        match active.len() {
            0 | 1 => Ok(active.pop()),
            n => Err(RegistryError::invalid_resident(
                id,
                format!("{n} active household memberships"),
            )),
        }
    }

    fn active_member_ids(&self, household: &HouseholdId) -> Result<Vec<ResidentId>> {
        Ok(self
            .memberships_of(household)?
            .into_values()
            .filter(|m| m.is_active)
            .map(|m| m.resident_id)
            .collect())
    }

    fn get_active_members(&self, household: &HouseholdId) -> Result<Vec<ActiveMember>> {
        let ids = self.active_member_ids(household)?;
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            let facts = self.get_resident_facts(&id)?;
            let profile = self.get_sectoral_profile(&id)?.ok_or_else(|| {
                RegistryError::invalid_resident(&id, "sectoral profile not yet computed")
            })?;
            members.push(ActiveMember {
                resident_id: id,
                monthly_salary: facts.monthly_salary,
                profile,
            });
        }
        Ok(members)
    }

    fn get_household(&self, household: &HouseholdId) -> Result<Household> {
        let state = self.store.read()?;
        overlay(&self.staged.households, &state.households, household)
            .ok_or_else(|| RegistryError::household_not_found(household))
    }

    fn get_head(&self, household: &HouseholdId) -> Result<Option<ResidentRef>> {
        let Some(head) = self.get_household(household)?.head else {
            return Ok(None);
        };
        let facts = self.get_resident_facts(&head).map_err(|_| {
            RegistryError::invalid_household(household, format!("head {head} is not a registered resident"))
        })?;
        Ok(Some(ResidentRef {
            id: head,
            last_name: facts.last_name,
        }))
    }

    fn household_exists(&self, household: &HouseholdId) -> Result<bool> {
        let state = self.store.read()?;
        Ok(overlay(&self.staged.households, &state.households, household).is_some())
    }

    fn get_sectoral_profile(&self, id: &ResidentId) -> Result<Option<SectoralProfile>> {
        let state = self.store.read()?;
        Ok(overlay(&self.staged.profiles, &state.profiles, id))
    }

    fn get_household_aggregate(
        &self,
        household: &HouseholdId,
    ) -> Result<Option<HouseholdAggregate>> {
        let state = self.store.read()?;
        Ok(overlay(&self.staged.aggregates, &state.aggregates, household))
    }

    fn resident_ids(&self) -> Result<Vec<ResidentId>> {
        let state = self.store.read()?;
        Ok(overlay_keys(&self.staged.residents, &state.residents))
    }

    fn household_ids(&self) -> Result<Vec<HouseholdId>> {
        let state = self.store.read()?;
        Ok(overlay_keys(&self.staged.households, &state.households))
    }
}

impl FactWriter for MemoryTransaction<'_> {
    fn put_resident(&mut self, facts: ResidentFacts) -> Result<()> {
        self.staged.residents.insert(facts.id.clone(), Some(facts));
        Ok(())
    }

    fn delete_resident(&mut self, id: &ResidentId) -> Result<()> {
        self.get_resident_facts(id)?;
        for key in self.membership_keys_of(id)? {
            self.staged.memberships.insert(key, None);
        }
        self.staged.migrations.insert(id.clone(), None);
        self.staged.residents.insert(id.clone(), None);
        Ok(())
    }

    fn put_migration_record(&mut self, record: MigrationRecord) -> Result<()> {
        self.staged
            .migrations
            .insert(record.resident_id.clone(), Some(record));
        Ok(())
    }

    fn delete_migration_record(&mut self, id: &ResidentId) -> Result<()> {
        self.staged.migrations.insert(id.clone(), None);
        Ok(())
    }

    fn put_household(&mut self, household: Household) -> Result<()> {
        self.staged
            .households
            .insert(household.id.clone(), Some(household));
        Ok(())
    }

    fn delete_household(&mut self, id: &HouseholdId) -> Result<()> {
        if !self.household_exists(id)? {
            return Err(RegistryError::household_not_found(id));
        }
        for resident in self.memberships_of(id)?.into_keys() {
            self.staged.memberships.insert((id.clone(), resident), None);
        }
        self.staged.households.insert(id.clone(), None);
        Ok(())
    }

    fn put_membership(&mut self, membership: HouseholdMembership) -> Result<()> {
        self.staged
            .memberships
            .insert(membership.key(), Some(membership));
        Ok(())
    }

    fn deactivate_membership(
        &mut self,
        household: &HouseholdId,
        resident: &ResidentId,
        move_out: NaiveDate,
    ) -> Result<()> {
        let key = (household.clone(), resident.clone());
        let mut membership = self.membership(&key)?.ok_or_else(|| {
            RegistryError::invalid_resident(resident, format!("no membership in household {household}"))
        })?;
        membership.deactivate(move_out);
        self.staged.memberships.insert(key, Some(membership));
        Ok(())
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn save_sectoral_profile(&mut self, profile: SectoralProfile) -> Result<()> {
        self.staged
            .profiles
            .insert(profile.resident_id.clone(), Some(profile));
        Ok(())
    }

    fn save_household_aggregate(&mut self, aggregate: HouseholdAggregate) -> Result<()> {
        self.staged
            .aggregates
            .insert(aggregate.household_id.clone(), Some(aggregate));
        Ok(())
    }

    fn delete_sectoral_profile(&mut self, id: &ResidentId) -> Result<()> {
        self.staged.profiles.insert(id.clone(), None);
        Ok(())
    }

    fn delete_household_aggregate(&mut self, household: &HouseholdId) -> Result<()> {
        self.staged.aggregates.insert(household.clone(), None);
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let Self { store, staged } = *self;
        if staged.is_empty() {
            return Ok(());
        }
        let mut state = store.write()?;
        let touched = Touched::of(&staged);
        let undo = apply(&mut state, staged);
        if let Err(e) = touched.check(&state) {
            rollback(&mut state, undo);
            return Err(e);
        }
        Ok(())
    }
}

/// Entities whose invariants a commit could affect
#[derive(Default)]
struct Touched {
    residents: FxHashSet<ResidentId>,
    households: FxHashSet<HouseholdId>,
}

impl Touched {
    fn of(staged: &Staged) -> Self {
        let mut touched = Self::default();
        touched.residents.extend(staged.residents.keys().cloned());
        touched.residents.extend(staged.profiles.keys().cloned());
        touched.households.extend(staged.households.keys().cloned());
        touched.households.extend(staged.aggregates.keys().cloned());
        for (household, resident) in staged.memberships.keys() {
            touched.residents.insert(resident.clone());
            touched.households.insert(household.clone());
        }
        touched
    }

    fn check(&self, state: &StoreState) -> Result<()> {
        for id in &self.residents {
            match state.residents.get(id) {
                Some(facts) => {
                    if facts.monthly_salary.is_some_and(|s| s.is_negative()) {
                        return Err(RegistryError::invalid_resident(id, "negative monthly salary"));
                    }
                    let active = state.active_households_of(id);
                    if active.len() > 1 {
                        return Err(RegistryError::invalid_resident(
                            id,
                            format!("{} active household memberships", active.len()),
                        ));
                    }
                }
                None => {
                    if state.by_resident.contains_key(id) {
                        return Err(RegistryError::invalid_resident(
                            id,
                            "membership references a missing resident",
                        ));
                    }
                    if state.profiles.contains_key(id) {
                        return Err(RegistryError::invalid_resident(
                            id,
                            "sectoral profile references a missing resident",
                        ));
                    }
                }
            }
        }
        for id in &self.households {
            if state.households.contains_key(id) {
                continue;
            }
            if !state.memberships_of(id).is_empty() {
                return Err(RegistryError::invalid_household(
                    id,
                    "membership references a missing household",
                ));
            }
            if state.aggregates.contains_key(id) {
                return Err(RegistryError::invalid_household(
                    id,
                    "aggregate references a missing household",
                ));
            }
        }
        Ok(())
    }
}

fn apply(state: &mut StoreState, staged: Staged) -> Vec<Undo> {
    let mut undo = Vec::new();
    for (k, v) in staged.residents {
        let old = replace(&mut state.residents, k.clone(), v);
        undo.push(Undo::Resident(k, old));
    }
    for (k, v) in staged.migrations {
        let old = replace(&mut state.migrations, k.clone(), v);
        undo.push(Undo::Migration(k, old));
    }
    for (k, v) in staged.households {
        let old = replace(&mut state.households, k.clone(), v);
        undo.push(Undo::Household(k, old));
    }
    for (k, v) in staged.memberships {
        let old = state.set_membership(k.clone(), v);
        undo.push(Undo::Membership(k, old));
    }
    for (k, v) in staged.profiles {
        let old = replace(&mut state.profiles, k.clone(), v);
        undo.push(Undo::Profile(k, old));
    }
    for (k, v) in staged.aggregates {
        let old = replace(&mut state.aggregates, k.clone(), v);
        undo.push(Undo::Aggregate(k, old));
    }
    undo
}

fn rollback(state: &mut StoreState, undo: Vec<Undo>) {
    for entry in undo.into_iter().rev() {
        match entry {
            Undo::Resident(k, v) => {
                replace(&mut state.residents, k, v);
            }
            Undo::Migration(k, v) => {
                replace(&mut state.migrations, k, v);
            }
            Undo::Household(k, v) => {
                replace(&mut state.households, k, v);
            }
            Undo::Membership(k, v) => {
                state.set_membership(k, v);
            }
            Undo::Profile(k, v) => {
                replace(&mut state.profiles, k, v);
            }
            Undo::Aggregate(k, v) => {
                replace(&mut state.aggregates, k, v);
            }
        }
    }
}
