#[cfg(test)]
mod tests {
    use crate::utils::{
        FailingStore, aggregate, as_of, coordinator_with, date, profile, resident_aged, seed,
        seed_household, test_config,
    };
    use registry_sync::reconcile::reconcile_entities;
    use registry_sync::{
        CancellationToken, Centavos, FactStore, FactWriter, HouseholdId, MemoryStore,
        MigrationRecord, RecomputationCoordinator, ReconcileConfig, Reconciler, ResidentFacts,
        ResidentId, Transaction, reconcile_all,
    };

    /// Two households and one resident without a household; nothing derived yet
    fn seed_registry(tx: &mut dyn Transaction) -> registry_sync::Result<()> {
        seed_household(
            tx,
            "H1",
            // Turns 60 on the reference date
            resident_aged("R1", "Mabini", 60).with_salary(Centavos::from_pesos(15_000)),
            vec![resident_aged("R2", "Mabini", 30)],
        )?;
        tx.put_migration_record(MigrationRecord::new("R2"))?;
        seed_household(tx, "H2", resident_aged("R3", "Luna", 45), vec![])?;
        tx.put_resident(resident_aged("R4", "Jacinto", 19))
    }

    fn registry() -> RecomputationCoordinator<MemoryStore> {
        coordinator_with(seed_registry)
    }

    fn sequential() -> ReconcileConfig {
        ReconcileConfig {
            parallel: false,
            ..ReconcileConfig::default()
        }
    }

    #[test]
    fn test_first_sweep_builds_everything_second_is_clean() {
        let coordinator = registry();
        let first = reconcile_all(&coordinator, as_of()).unwrap();
        assert_eq!(first.residents_checked, 4);
        assert_eq!(first.households_checked, 2);
        assert_eq!(first.profiles_corrected, 4);
        assert_eq!(first.aggregates_corrected, 2);
        assert!(first.errors.is_empty());

        let h1 = aggregate(coordinator.store(), "H1").unwrap();
        assert_eq!(h1.member_count, 2);
        assert_eq!(h1.migrant_count, 1);

        let second = reconcile_all(&coordinator, as_of()).unwrap();
        assert_eq!(second.corrections(), 0);
        assert!(second.is_clean());
    }

    #[test]
    fn test_time_driven_senior_flip() {
        let coordinator = registry();
        let eve = as_of().pred_opt().unwrap();
        Reconciler::new(&coordinator, sequential())
            .run(eve, &CancellationToken::new())
            .unwrap();
        assert!(!profile(coordinator.store(), "R1").unwrap().is_senior_citizen);

        let report = Reconciler::new(&coordinator, sequential())
            .run(as_of(), &CancellationToken::new())
            .unwrap();
        assert!(profile(coordinator.store(), "R1").unwrap().is_senior_citizen);
        assert_eq!(report.profiles_corrected, 1);
        // Household aggregates do not depend on the senior flag
        assert_eq!(report.aggregates_corrected, 0);
    }

    #[test]
    fn test_repairs_tampered_aggregate() {
        let coordinator = registry();
        reconcile_all(&coordinator, as_of()).unwrap();
        let good = aggregate(coordinator.store(), "H1").unwrap();

        {
            let mut tx = coordinator.store().begin().unwrap();
            let mut bad = good.clone();
            bad.member_count = 7;
            bad.total_monthly_income = Centavos::ZERO;
            tx.save_household_aggregate(bad).unwrap();
            tx.commit().unwrap();
        }

        let report = reconcile_all(&coordinator, as_of()).unwrap();
        assert_eq!(report.aggregates_corrected, 1);
        assert_eq!(aggregate(coordinator.store(), "H1").unwrap(), good);
    }

    #[test]
    fn test_bad_record_is_reported_and_sweep_continues() {
        let coordinator = registry();
        {
            let mut tx = coordinator.store().begin().unwrap();
            tx.put_resident(ResidentFacts::new("R9", "Test", "Future", date(2030, 1, 1)))
                .unwrap();
            tx.commit().unwrap();
        }

        let report = reconcile_all(&coordinator, as_of()).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].entity.contains("R9"));
        assert!(!report.errors[0].retryable);
        assert_eq!(report.profiles_corrected, 4);
        assert_eq!(report.aggregates_corrected, 2);
    }

    #[test]
    fn test_cancelled_sweep_skips_everything() {
        let coordinator = registry();
        let token = CancellationToken::new();
        token.cancel();
        let report = Reconciler::new(&coordinator, sequential())
            .run(as_of(), &token)
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.skipped, 6);
        assert_eq!(report.corrections(), 0);
        assert!(profile(coordinator.store(), "R1").is_none());
    }

    #[test]
    fn test_sweep_cancelled_midway_leaves_consistent_records() {
        let store = FailingStore::new(MemoryStore::new());
        seed(&store, seed_registry);
        let coordinator = RecomputationCoordinator::new(store, &test_config()).unwrap();

        let token = CancellationToken::new();
        coordinator.store().cancel_after_commits(2, token.clone());
        let report = Reconciler::new(&coordinator, sequential())
            .run(as_of(), &token)
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(report.profiles_corrected, 2);
        assert_eq!(report.skipped, 4);
        assert!(report.errors.is_empty());

        // Whatever was written is current; the rest was never written
        let mut stored_profiles = 0;
        for resident in ["R1", "R2", "R3", "R4"] {
            let drift = coordinator
                .verify_resident(&ResidentId::from(resident), as_of())
                .unwrap();
            if drift.stored.is_some() {
                stored_profiles += 1;
                assert!(!drift.drifted, "{resident} left stale");
            }
        }
        assert_eq!(stored_profiles, 2);
        for household in ["H1", "H2"] {
            assert!(aggregate(coordinator.store(), household).is_none());
        }

        let resumed = reconcile_all(&coordinator, as_of()).unwrap();
        assert!(!resumed.cancelled);
        assert!(resumed.errors.is_empty());
        assert_eq!(resumed.profiles_corrected, 2);
        assert_eq!(resumed.aggregates_corrected, 2);
        assert!(reconcile_all(&coordinator, as_of()).unwrap().is_clean());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let parallel = registry();
        let sequential_run = registry();
        let config = ReconcileConfig {
            parallel: true,
            threads: Some(4),
            ..ReconcileConfig::default()
        };
        Reconciler::new(&parallel, config)
            .run(as_of(), &CancellationToken::new())
            .unwrap();
        Reconciler::new(&sequential_run, sequential())
            .run(as_of(), &CancellationToken::new())
            .unwrap();

        for household in ["H1", "H2"] {
            assert_eq!(
                aggregate(parallel.store(), household),
                aggregate(sequential_run.store(), household)
            );
        }
        for resident in ["R1", "R2", "R3", "R4"] {
            assert_eq!(
                profile(parallel.store(), resident),
                profile(sequential_run.store(), resident)
            );
        }
    }

    #[test]
    fn test_reconcile_selected_entities() {
        let coordinator = registry();
        let report = reconcile_entities(
            &coordinator,
            &[ResidentId::from("R4")],
            &[HouseholdId::from("H2")],
            as_of(),
        )
        .unwrap();
        assert_eq!(report.profiles_corrected, 1);
        // R3 gets a profile on the way to the H2 aggregate
        assert_eq!(report.aggregates_corrected, 1);
        assert!(profile(coordinator.store(), "R3").is_some());
        assert!(profile(coordinator.store(), "R1").is_none());
    }

    #[test]
    fn test_household_gone_mid_sweep_is_not_an_error() {
        let coordinator = registry();
        let report = reconcile_entities(&coordinator, &[], &[HouseholdId::from("H404")], as_of())
            .unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.aggregates_corrected, 0);
    }
}
