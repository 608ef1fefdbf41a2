//! Timer-driven reconciliation
//!
//! Runs a sweep on a fixed interval until cancelled. Sweeps are blocking work
//! and run on tokio's blocking pool so the timer keeps ticking.

use super::{CancellationToken, Reconciler};
use crate::config::ReconcileConfig;
use crate::coordinator::RecomputationCoordinator;
use crate::error::{RegistryError, Result};
use crate::store::FactStore;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Periodic reconciliation over a shared coordinator
pub struct ReconciliationScheduler<S: FactStore + 'static> {
    coordinator: Arc<RecomputationCoordinator<S>>,
    config: ReconcileConfig,
    interval: Duration,
    clock: Clock,
}

impl<S: FactStore + 'static> ReconciliationScheduler<S> {
    /// Sweep every `config.interval()`, dating each sweep by the local calendar
    pub fn new(coordinator: Arc<RecomputationCoordinator<S>>, config: ReconcileConfig) -> Self {
        Self {
            coordinator,
            interval: config.interval(),
            config,
            clock: Arc::new(|| Local::now().date_naive()),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Use `clock` for each sweep's as-of date
    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Run sweeps until `token` is cancelled; returns how many completed
    ///
    /// The first sweep starts immediately. A sweep in progress when the token
    /// fires stops early and still counts. A sweep that fails as a whole is
    /// logged and retried on the next tick.
    pub async fn run(&self, token: CancellationToken) -> Result<usize> {
        if self.interval.is_zero() {
            return Err(RegistryError::Config(
                "reconciliation interval must be positive".to_string(),
            ));
        }
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweeps = 0;

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let coordinator = Arc::clone(&self.coordinator);
            let config = self.config.clone();
            let as_of = (self.clock)();
            let sweep_token = token.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                Reconciler::new(&coordinator, config).run(as_of, &sweep_token)
            })
            .await
            .map_err(|e| RegistryError::Task(format!("reconciliation task: {e}")))
            .and_then(|result| result);
            let report = match outcome {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Reconciliation sweep as of {as_of} failed: {e}");
                    continue;
                }
            };

            log::info!("{report}");
            for failure in &report.errors {
                log::warn!("Could not reconcile {}: {}", failure.entity, failure.message);
            }
            sweeps += 1;
        }

        log::info!("Reconciliation scheduler stopped after {sweeps} sweeps");
        Ok(sweeps)
    }
}
