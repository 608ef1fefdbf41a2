//! JSON snapshots of registry state
//!
//! A snapshot carries the fact tables and, optionally, the derived records.
//! Loading one into a [`MemoryStore`] goes through a single transaction, so
//! a snapshot that breaks an invariant is rejected whole.

use super::memory::MemoryStore;
use super::{FactStore, FactWriter, Transaction};
use crate::error::Result;
use crate::models::{
    Household, HouseholdAggregate, HouseholdMembership, MigrationRecord, ResidentFacts,
    SectoralProfile,
};
use crate::utils::logging::{log_operation_complete, log_operation_start};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

/// Serializable copy of a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySnapshot {
    pub residents: Vec<ResidentFacts>,
    pub households: Vec<Household>,
    pub memberships: Vec<HouseholdMembership>,
    pub migration_records: Vec<MigrationRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sectoral_profiles: Vec<SectoralProfile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub household_aggregates: Vec<HouseholdAggregate>,
}

impl RegistrySnapshot {
    /// Read a snapshot from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        log_operation_start("Reading snapshot", path.display());
        let start = Instant::now();
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = serde_json::from_reader(reader)?;
        log_operation_complete(
            "read",
            path.display(),
            snapshot.residents.len() + snapshot.households.len(),
            Some(start.elapsed()),
        );
        Ok(snapshot)
    }

    /// Write the snapshot as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        log_operation_start("Writing snapshot", path.display());
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        log_operation_complete(
            "wrote",
            path.display(),
            self.residents.len() + self.households.len(),
            None,
        );
        Ok(())
    }

    /// Build a store holding this snapshot's records
    pub fn into_store(self) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin()?;
            for resident in self.residents {
                tx.put_resident(resident)?;
            }
            for household in self.households {
                tx.put_household(household)?;
            }
            for membership in self.memberships {
                tx.put_membership(membership)?;
            }
            for record in self.migration_records {
                tx.put_migration_record(record)?;
            }
            for profile in self.sectoral_profiles {
                tx.save_sectoral_profile(profile)?;
            }
            for aggregate in self.household_aggregates {
                tx.save_household_aggregate(aggregate)?;
            }
            tx.commit()?;
        }
        Ok(store)
    }

    /// Capture the committed contents of a store
    pub fn from_store(store: &MemoryStore, include_derived: bool) -> Result<Self> {
        let (residents, households, memberships, migration_records) = store.fact_records()?;
        let (sectoral_profiles, household_aggregates) = if include_derived {
            store.derived_records()?
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(Self {
            residents,
            households,
            memberships,
            migration_records,
            sectoral_profiles,
            household_aggregates,
        })
    }
}
