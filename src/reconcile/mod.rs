//! Periodic reconciliation
//!
//! Sectoral flags depend on age, and age changes with the calendar even when
//! no fact does. A sweep walks every resident, then every household, and
//! rewrites whichever derived records no longer match a fresh computation.
//! Residents go first so the household pass aggregates up-to-date profiles.
//!
//! Each entity is reconciled under its household lock with the same retry
//! policy as event-driven recomputes. One failing entity is recorded in the
//! report and the sweep moves on.

pub mod cancel;
pub mod report;
pub mod schedule;

pub use cancel::CancellationToken;
pub use report::{EntityFailure, ReconciliationReport};
pub use schedule::ReconciliationScheduler;

use crate::config::ReconcileConfig;
use crate::coordinator::RecomputationCoordinator;
use crate::error::{EntityRef, RegistryError, Result};
use crate::models::{HouseholdId, ResidentId};
use crate::store::{FactReader, FactStore};
use crate::utils::logging::{
    create_sweep_progress_bar, finish_progress_bar, log_operation_complete, log_operation_start,
    log_warning,
};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::time::Instant;

/// Result of reconciling one entity
#[derive(Debug)]
enum Step {
    Unchanged,
    Corrected,
    Skipped,
    Failed(EntityFailure),
}

impl Step {
    fn from_result(entity: EntityRef, result: Result<bool>) -> Self {
        match result {
            Ok(true) => Self::Corrected,
            Ok(false) => Self::Unchanged,
            // Deleted after the sweep listed it
            Err(RegistryError::NotFound { entity: missing }) if missing == entity => Self::Skipped,
            Err(e) => {
                log::error!("Reconciliation failed for {entity}: {e}");
                Self::Failed(EntityFailure {
                    entity: entity.to_string(),
                    message: e.to_string(),
                    retryable: e.is_retryable(),
                })
            }
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    checked: usize,
    corrected: usize,
    skipped: usize,
    errors: Vec<EntityFailure>,
}

impl Tally {
    fn add(mut self, step: Step) -> Self {
        match step {
            Step::Unchanged => self.checked += 1,
            Step::Corrected => {
                self.checked += 1;
                self.corrected += 1;
            }
            Step::Skipped => self.skipped += 1,
            Step::Failed(failure) => {
                self.checked += 1;
                self.errors.push(failure);
            }
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.checked += other.checked;
        self.corrected += other.corrected;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
        self
    }
}

/// Runs reconciliation sweeps over a coordinator's store
#[derive(Debug)]
pub struct Reconciler<'a, S: FactStore> {
    coordinator: &'a RecomputationCoordinator<S>,
    config: ReconcileConfig,
}

impl<'a, S: FactStore> Reconciler<'a, S> {
    #[must_use]
    pub const fn new(coordinator: &'a RecomputationCoordinator<S>, config: ReconcileConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Sweep every resident and household as of `as_of`
    ///
    /// Safe to run alongside event-driven recomputes. Once `token` is
    /// cancelled, entities not yet reached are counted as skipped and the
    /// partial report is returned.
    pub fn run(&self, as_of: NaiveDate, token: &CancellationToken) -> Result<ReconciliationReport> {
        log_operation_start("Reconciling derived records as of", as_of);
        let start = Instant::now();

        let (resident_ids, household_ids) = {
            let tx = self.coordinator.store().begin()?;
            (tx.resident_ids()?, tx.household_ids()?)
        };

        let pool = if self.config.parallel {
            let threads = self.config.thread_count();
            log::debug!("Using parallel reconciliation with {threads} threads");
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| RegistryError::Task(format!("cannot build thread pool: {e}")))?,
            )
        } else {
            None
        };

        let pb = create_sweep_progress_bar(
            (resident_ids.len() + household_ids.len()) as u64,
            "reconciling",
            self.config.show_progress,
        );

        let residents = self.sweep(pool.as_ref(), &resident_ids, &pb, token, |id| {
            Step::from_result(
                EntityRef::Resident(id.clone()),
                self.coordinator.reconcile_resident(id, as_of),
            )
        });
        let households = self.sweep(pool.as_ref(), &household_ids, &pb, token, |id| {
            Step::from_result(
                EntityRef::Household(id.clone()),
                self.coordinator.reconcile_household(id, as_of),
            )
        });
        finish_progress_bar(&pb, Some("reconciliation complete"));

        let report = build_report(as_of, residents, households, token.is_cancelled(), start);

        if report.cancelled {
            log_warning("Reconciliation cancelled before completion", Some(&as_of));
        }
        log_operation_complete("reconciled", as_of, report.corrections(), Some(report.elapsed));
        Ok(report)
    }

    fn sweep<T, F>(
        &self,
        pool: Option<&rayon::ThreadPool>,
        ids: &[T],
        pb: &ProgressBar,
        token: &CancellationToken,
        check: F,
    ) -> Tally
    where
        T: Sync,
        F: Fn(&T) -> Step + Sync,
    {
        let step = |id: &T| {
            let step = if token.is_cancelled() {
                Step::Skipped
            } else {
                check(id)
            };
            pb.inc(1);
            step
        };
        match pool {
            Some(pool) => pool.install(|| {
                ids.par_iter()
                    .map(step)
                    .fold(Tally::default, Tally::add)
                    .reduce(Tally::default, Tally::merge)
            }),
            None => ids.iter().map(step).fold(Tally::default(), Tally::add),
        }
    }
}

/// Run a single sweep with the coordinator's store and default settings
pub fn reconcile_all<S: FactStore>(
    coordinator: &RecomputationCoordinator<S>,
    as_of: NaiveDate,
) -> Result<ReconciliationReport> {
    Reconciler::new(coordinator, ReconcileConfig::default()).run(as_of, &CancellationToken::new())
}

/// Reconcile a fixed set of entities, e.g. after a bulk import
pub fn reconcile_entities<S: FactStore>(
    coordinator: &RecomputationCoordinator<S>,
    residents: &[ResidentId],
    households: &[HouseholdId],
    as_of: NaiveDate,
) -> Result<ReconciliationReport> {
    let start = Instant::now();
    let residents = residents.iter().fold(Tally::default(), |tally, id| {
        tally.add(Step::from_result(
            EntityRef::Resident(id.clone()),
            coordinator.reconcile_resident(id, as_of),
        ))
    });
    let households = households.iter().fold(Tally::default(), |tally, id| {
        tally.add(Step::from_result(
            EntityRef::Household(id.clone()),
            coordinator.reconcile_household(id, as_of),
        ))
    });
    Ok(build_report(as_of, residents, households, false, start))
}

fn build_report(
    as_of: NaiveDate,
    residents: Tally,
    households: Tally,
    cancelled: bool,
    start: Instant,
) -> ReconciliationReport {
    let mut report = ReconciliationReport::new(as_of);
    report.residents_checked = residents.checked;
    report.profiles_corrected = residents.corrected;
    report.households_checked = households.checked;
    report.aggregates_corrected = households.corrected;
    report.skipped = residents.skipped + households.skipped;
    report.cancelled = cancelled;
    report.errors = residents.errors;
    report.errors.extend(households.errors);
    report.elapsed = start.elapsed();
    report
}
