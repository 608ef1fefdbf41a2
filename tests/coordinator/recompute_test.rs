#[cfg(test)]
mod tests {
    use crate::utils::{aggregate, as_of, coordinator_with, profile, resident_aged, seed_household};
    use chrono::Datelike;
    use registry_sync::{
        Centavos, EmploymentStatus, FactChange, FactReader, FactStore, FactWriter, HouseholdId,
        HouseholdMembership, MemoryStore, MigrationRecord, RecomputationCoordinator, RegistryError,
        Relationship, ResidentId,
    };

    /// H1: R1 (head, 15000) and R2 (no salary); H2: R3 (head, 8000)
    fn two_households() -> RecomputationCoordinator<MemoryStore> {
        coordinator_with(|tx| {
            seed_household(
                tx,
                "H1",
                resident_aged("R1", "Bonifacio", 45).with_salary(Centavos::from_pesos(15_000)),
                vec![resident_aged("R2", "Bonifacio", 20)],
            )?;
            seed_household(
                tx,
                "H2",
                resident_aged("R3", "Aquino", 38).with_salary(Centavos::from_pesos(8_000)),
                vec![],
            )
        })
    }

    fn h(id: &str) -> HouseholdId {
        HouseholdId::from(id)
    }

    fn r(id: &str) -> ResidentId {
        ResidentId::from(id)
    }

    #[test]
    fn test_facts_change_recomputes_profile_then_household() {
        let coordinator = two_households();
        let outcome = coordinator.on_resident_facts_changed(&r("R1"), as_of()).unwrap();

        assert_eq!(outcome.profiles.len(), 1);
        let aggregate = outcome.aggregate(&h("H1")).unwrap();
        assert_eq!(aggregate.member_count, 2);
        assert_eq!(aggregate.total_monthly_income, Centavos::from_pesos(15_000));
        assert_eq!(aggregate.household_name.as_deref(), Some("Bonifacio"));

        // Members without a profile get one before aggregation
        assert!(profile(coordinator.store(), "R2").is_some());
        assert_eq!(
            crate::utils::aggregate(coordinator.store(), "H1").as_ref(),
            Some(aggregate)
        );
    }

    #[test]
    fn test_resident_without_household_only_gets_profile() {
        let coordinator = coordinator_with(|tx| tx.put_resident(resident_aged("R9", "Luna", 30)));
        let outcome = coordinator.on_resident_facts_changed(&r("R9"), as_of()).unwrap();
        assert_eq!(outcome.profiles.len(), 1);
        assert!(outcome.aggregates.is_empty());
    }

    #[test]
    fn test_migration_record_moves_migrant_count_by_one() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();
        assert_eq!(aggregate(coordinator.store(), "H1").unwrap().migrant_count, 0);

        let outcome = coordinator
            .apply(&FactChange::MigrationRecord(r("R2")), as_of(), |tx| {
                tx.put_migration_record(MigrationRecord::new("R2"))
            })
            .unwrap();
        assert!(outcome.profiles[0].is_migrant);
        assert_eq!(aggregate(coordinator.store(), "H1").unwrap().migrant_count, 1);

        coordinator
            .apply(&FactChange::MigrationRecord(r("R2")), as_of(), |tx| {
                tx.delete_migration_record(&r("R2"))
            })
            .unwrap();
        assert!(!profile(coordinator.store(), "R2").unwrap().is_migrant);
        assert_eq!(aggregate(coordinator.store(), "H1").unwrap().migrant_count, 0);
    }

    #[test]
    fn test_added_member_salary_adds_exactly() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();
        let before = aggregate(coordinator.store(), "H1").unwrap();

        coordinator
            .apply(&FactChange::HouseholdMembership(h("H1")), as_of(), |tx| {
                tx.put_resident(
                    resident_aged("R4", "Bonifacio", 30).with_salary(Centavos::from_pesos(4_321)),
                )?;
                tx.put_membership(HouseholdMembership::active("H1", "R4", Relationship::Child))
            })
            .unwrap();

        let after = aggregate(coordinator.store(), "H1").unwrap();
        assert_eq!(after.member_count, before.member_count + 1);
        assert_eq!(
            after.total_monthly_income.value() - before.total_monthly_income.value(),
            Centavos::from_pesos(4_321).value()
        );
    }

    #[test]
    fn test_transfer_updates_both_households() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();
        coordinator.on_household_membership_changed(&h("H2"), as_of()).unwrap();

        let change = FactChange::MembershipTransfer {
            resident: r("R2"),
            from: h("H1"),
            to: h("H2"),
        };
        let outcome = coordinator
            .apply(&change, as_of(), |tx| {
                tx.deactivate_membership(&h("H1"), &r("R2"), as_of())?;
                tx.put_membership(HouseholdMembership::active("H2", "R2", Relationship::NonRelative))
            })
            .unwrap();

        assert_eq!(outcome.aggregate(&h("H1")).unwrap().member_count, 1);
        assert_eq!(outcome.aggregate(&h("H2")).unwrap().member_count, 2);
        assert_eq!(aggregate(coordinator.store(), "H1").unwrap().member_count, 1);
        assert_eq!(aggregate(coordinator.store(), "H2").unwrap().member_count, 2);

        let tx = coordinator.store().begin().unwrap();
        assert_eq!(tx.get_active_membership(&r("R2")).unwrap(), Some(h("H2")));
    }

    #[test]
    fn test_transfer_that_did_not_move_is_rejected() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();

        let err = coordinator
            .on_membership_transferred(&r("R2"), &h("H1"), &h("H2"), as_of())
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation { .. }));
        assert!(aggregate(coordinator.store(), "H2").is_none());
    }

    #[test]
    fn test_missing_resident_is_not_found() {
        let coordinator = two_households();
        let err = coordinator.on_resident_facts_changed(&r("R404"), as_of()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_resident_deleted_drops_profile_and_shrinks_household() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();

        let outcome = coordinator.on_resident_deleted(&r("R2"), as_of()).unwrap();
        assert_eq!(outcome.aggregate(&h("H1")).unwrap().member_count, 1);
        assert!(profile(coordinator.store(), "R2").is_none());
        let tx = coordinator.store().begin().unwrap();
        assert!(tx.get_resident_facts(&r("R2")).is_err());
    }

    #[test]
    fn test_deleting_head_clears_household_name() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();

        coordinator.on_resident_deleted(&r("R1"), as_of()).unwrap();
        let aggregate = aggregate(coordinator.store(), "H1").unwrap();
        assert_eq!(aggregate.member_count, 1);
        assert_eq!(aggregate.household_name, None);
        assert_eq!(aggregate.total_monthly_income, Centavos::ZERO);
    }

    #[test]
    fn test_household_deleted_drops_aggregate() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H2"), as_of()).unwrap();
        assert!(aggregate(coordinator.store(), "H2").is_some());

        coordinator.on_household_deleted(&h("H2"), as_of()).unwrap();
        assert!(aggregate(coordinator.store(), "H2").is_none());
        let tx = coordinator.store().begin().unwrap();
        assert!(!tx.household_exists(&h("H2")).unwrap());
        assert_eq!(tx.get_active_membership(&r("R3")).unwrap(), None);
        // The former member keeps its own profile
        assert!(tx.get_resident_facts(&r("R3")).is_ok());
    }

    #[test]
    fn test_empty_household_aggregate() {
        let coordinator = coordinator_with(|tx| {
            tx.put_household(registry_sync::Household::new("H7"))
        });
        let outcome = coordinator.on_household_membership_changed(&h("H7"), as_of()).unwrap();
        let aggregate = outcome.aggregate(&h("H7")).unwrap();
        assert_eq!(aggregate.member_count, 0);
        assert_eq!(aggregate.migrant_count, 0);
        assert_eq!(aggregate.total_monthly_income, Centavos::ZERO);
        assert_eq!(aggregate.income_class, None);
        assert_eq!(aggregate.household_name, None);
    }

    #[test]
    fn test_employment_change_flows_into_profile() {
        let coordinator = two_households();
        coordinator.on_resident_facts_changed(&r("R2"), as_of()).unwrap();
        assert!(!profile(coordinator.store(), "R2").unwrap().is_unemployed);

        coordinator
            .apply(&FactChange::ResidentFacts(r("R2")), as_of(), |tx| {
                let facts = tx
                    .get_resident_facts(&r("R2"))?
                    .with_employment(EmploymentStatus::LookingForWork);
                tx.put_resident(facts)
            })
            .unwrap();
        assert!(profile(coordinator.store(), "R2").unwrap().is_unemployed);
    }

    #[test]
    fn test_verify_reports_drift_without_writing() {
        let coordinator = two_households();
        coordinator.on_household_membership_changed(&h("H1"), as_of()).unwrap();

        let clean = coordinator.verify_resident(&r("R1"), as_of()).unwrap();
        assert!(!clean.drifted);

        // R1 turns 60 fifteen years later without any fact changing
        let later = as_of().with_year(2041).unwrap();
        let drift = coordinator.verify_resident(&r("R1"), later).unwrap();
        assert!(drift.drifted);
        assert!(drift.fresh.is_senior_citizen);
        assert!(!drift.stored.unwrap().is_senior_citizen);
        assert!(!profile(coordinator.store(), "R1").unwrap().is_senior_citizen);

        assert!(!coordinator.verify_household(&h("H1")).unwrap().drifted);
    }
}
