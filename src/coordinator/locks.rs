//! Per-entity exclusive locks
//!
//! Every read-then-write of a household aggregate happens while holding that
//! household's lock, and every read-then-write of a resident's profile while
//! holding the resident's lock. Locks are taken in [`EntityRef`] order:
//! households sorted by id, then residents sorted by id. A guard may be
//! extended with resident locks once its households are held, which keeps
//! that order, so two operations cannot wait on each other. Acquisition is
//! bounded by a timeout that surfaces as a retryable `ConcurrencyTimeout`.

use crate::error::{EntityRef, RegistryError, Result};
use crate::models::{HouseholdId, ResidentId};
use itertools::Itertools;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Slot {
    held: Mutex<bool>,
    released: Condvar,
}

/// Table of per-entity locks, created on demand
#[derive(Debug)]
pub struct LockTable {
    slots: Mutex<FxHashMap<EntityRef, Arc<Slot>>>,
    timeout: Duration,
}

impl LockTable {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(FxHashMap::default()),
            timeout,
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    fn slot(&self, entity: &EntityRef) -> Arc<Slot> {
        Arc::clone(self.slots.lock().entry(entity.clone()).or_default())
    }

    /// Acquire the locks of every listed entity
    ///
    /// Duplicates are ignored. The whole set shares one deadline; on timeout
    /// any locks already taken are released.
    pub fn acquire(&self, entities: &[EntityRef]) -> Result<LockGuard<'_>> {
        let mut guard = LockGuard {
            locks: self,
            held: SmallVec::new(),
        };
        guard.extend(entities)?;
        Ok(guard)
    }

    /// Wait for `entity` until `deadline` and mark it held
    fn take(&self, entity: &EntityRef, deadline: Instant) -> Result<Arc<Slot>> {
        let slot = self.slot(entity);
        {
            let mut held = slot.held.lock();
            while *held {
                if slot.released.wait_until(&mut held, deadline).timed_out() && *held {
                    log::warn!("Timed out after {:?} waiting for {entity}", self.timeout);
                    return Err(RegistryError::ConcurrencyTimeout {
                        entity: entity.clone(),
                        waited: self.timeout,
                    });
                }
            }
            *held = true;
        }
        Ok(slot)
    }

    /// Number of entities with a live lock slot
    #[must_use]
    pub fn live_slots(&self) -> usize {
        self.slots.lock().len()
    }

    /// Drop the slot for an entity nobody holds or waits on
    fn prune(&self, entity: &EntityRef) {
        let mut slots = self.slots.lock();
        let idle = slots
            .get(entity)
            .is_some_and(|slot| Arc::strong_count(slot) == 1 && !*slot.held.lock());
        if idle {
            slots.remove(entity);
        }
    }
}

/// Held entity locks, released on drop
#[derive(Debug)]
pub struct LockGuard<'a> {
    locks: &'a LockTable,
    held: SmallVec<[(EntityRef, Arc<Slot>); 2]>,
}

impl LockGuard<'_> {
    /// Take the locks of `entities` this guard does not hold yet
    ///
    /// New locks must order after every lock already held. A guard holding
    /// only households can always be extended with residents.
    pub fn extend(&mut self, entities: &[EntityRef]) -> Result<()> {
        let deadline = Instant::now() + self.locks.timeout;
        let last = self.held.iter().map(|(entity, _)| entity).max().cloned();
        for entity in entities.iter().sorted().dedup() {
            if self.holds(entity) {
                continue;
            }
            if last.as_ref().is_some_and(|last| entity < last) {
                return Err(RegistryError::Conflict(format!(
                    "lock on {entity} requested out of order"
                )));
            }
            let slot = self.locks.take(entity, deadline)?;
            self.held.push((entity.clone(), slot));
        }
        Ok(())
    }

    /// Take the locks of the listed residents
    pub fn extend_residents<'r>(
        &mut self,
        residents: impl IntoIterator<Item = &'r ResidentId>,
    ) -> Result<()> {
        let entities: Vec<EntityRef> = residents
            .into_iter()
            .map(|id| EntityRef::Resident(id.clone()))
            .collect();
        self.extend(&entities)
    }

    fn holds(&self, entity: &EntityRef) -> bool {
        self.held.iter().any(|(id, _)| id == entity)
    }

    /// Whether this guard holds the lock of `household`
    #[must_use]
    pub fn covers(&self, household: &HouseholdId) -> bool {
        self.holds(&EntityRef::Household(household.clone()))
    }

    /// Whether this guard holds the lock of `resident`
    #[must_use]
    pub fn covers_resident(&self, resident: &ResidentId) -> bool {
        self.holds(&EntityRef::Resident(resident.clone()))
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        while let Some((entity, slot)) = self.held.pop() {
            *slot.held.lock() = false;
            slot.released.notify_all();
            drop(slot);
            self.locks.prune(&entity);
        }
    }
}
