#[cfg(test)]
mod tests {
    use crate::utils::{aggregate, as_of, coordinator_with, resident_aged, seed_household};
    use registry_sync::{
        Centavos, EntityRef, FactChange, FactReader, FactStore, FactWriter, Household,
        HouseholdId, HouseholdMembership, MemoryStore, RecomputationCoordinator, Relationship,
        ResidentId,
    };
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// R1 earns 1,000 and belongs to no household; H1 is empty
    fn lone_resident() -> RecomputationCoordinator<MemoryStore> {
        coordinator_with(|tx| {
            tx.put_household(Household::new("H1"))?;
            tx.put_resident(
                resident_aged("R1", "Silang", 30).with_salary(Centavos::from_pesos(1_000)),
            )
        })
    }

    fn join_h1(coordinator: &RecomputationCoordinator<MemoryStore>) {
        coordinator
            .apply(
                &FactChange::HouseholdMembership(HouseholdId::from("H1")),
                as_of(),
                |tx| tx.put_membership(HouseholdMembership::active("H1", "R1", Relationship::Head)),
            )
            .unwrap();
    }

    fn raise_r1(coordinator: &RecomputationCoordinator<MemoryStore>) {
        coordinator
            .apply(
                &FactChange::ResidentFacts(ResidentId::from("R1")),
                as_of(),
                |tx| {
                    let facts = tx
                        .get_resident_facts(&ResidentId::from("R1"))?
                        .with_salary(Centavos::from_pesos(5_000));
                    tx.put_resident(facts)
                },
            )
            .unwrap();
    }

    #[test]
    fn test_concurrent_add_member_has_no_lost_update() {
        let coordinator = coordinator_with(|tx| {
            seed_household(tx, "H1", resident_aged("R0", "Jacinto", 40), vec![])
        });
        coordinator
            .on_household_membership_changed(&HouseholdId::from("H1"), as_of())
            .unwrap();

        let writers = 8;
        thread::scope(|scope| {
            for i in 1..=writers {
                let coordinator = &coordinator;
                scope.spawn(move || {
                    let id = format!("R{i}");
                    coordinator
                        .apply(
                            &FactChange::HouseholdMembership(HouseholdId::from("H1")),
                            as_of(),
                            |tx| {
                                tx.put_resident(
                                    resident_aged(&id, "Jacinto", 20)
                                        .with_salary(Centavos::from_pesos(1_000)),
                                )?;
                                tx.put_membership(HouseholdMembership::active(
                                    "H1",
                                    id.as_str(),
                                    Relationship::Child,
                                ))
                            },
                        )
                        .unwrap();
                });
            }
        });

        let aggregate = aggregate(coordinator.store(), "H1").unwrap();
        assert_eq!(aggregate.member_count, 1 + writers);
        assert_eq!(
            aggregate.total_monthly_income,
            Centavos::from_pesos(1_000 * i64::from(writers))
        );
        assert_eq!(coordinator.locks().live_slots(), 0);
    }

    #[test]
    fn test_opposite_transfers_do_not_deadlock() {
        let coordinator = coordinator_with(|tx| {
            seed_household(
                tx,
                "H1",
                resident_aged("A0", "Del Pilar", 40),
                (1..=10).map(|i| resident_aged(&format!("A{i}"), "Del Pilar", 20)).collect(),
            )?;
            seed_household(
                tx,
                "H2",
                resident_aged("B0", "Luna", 40),
                (1..=10).map(|i| resident_aged(&format!("B{i}"), "Luna", 20)).collect(),
            )
        });

        let transfer = |resident: &str, from: &str, to: &str| {
            let (resident, from, to) = (
                ResidentId::from(resident),
                HouseholdId::from(from),
                HouseholdId::from(to),
            );
            let change = FactChange::MembershipTransfer {
                resident: resident.clone(),
                from: from.clone(),
                to: to.clone(),
            };
            coordinator
                .apply(&change, as_of(), |tx| {
                    tx.deactivate_membership(&from, &resident, as_of())?;
                    tx.put_membership(HouseholdMembership::active(
                        to.clone(),
                        resident.clone(),
                        Relationship::NonRelative,
                    ))
                })
                .unwrap();
        };

        thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=10 {
                    transfer(&format!("A{i}"), "H1", "H2");
                }
            });
            scope.spawn(|| {
                for i in 1..=10 {
                    transfer(&format!("B{i}"), "H2", "H1");
                }
            });
        });

        // Ten moved each way: sizes are unchanged and nobody is in both
        assert_eq!(aggregate(coordinator.store(), "H1").unwrap().member_count, 11);
        assert_eq!(aggregate(coordinator.store(), "H2").unwrap().member_count, 11);
        let tx = coordinator.store().begin().unwrap();
        assert_eq!(
            tx.get_active_membership(&ResidentId::from("A5")).unwrap(),
            Some(HouseholdId::from("H2"))
        );
        assert_eq!(
            tx.get_active_membership(&ResidentId::from("B5")).unwrap(),
            Some(HouseholdId::from("H1"))
        );
    }

    #[test]
    fn test_independent_households_recompute_in_parallel() {
        let coordinator = coordinator_with(|tx| {
            for i in 0..16 {
                seed_household(
                    tx,
                    &format!("H{i}"),
                    resident_aged(&format!("R{i}"), "Mabini", 30 + i),
                    vec![],
                )?;
            }
            Ok(())
        });

        thread::scope(|scope| {
            for i in 0..16 {
                let coordinator = &coordinator;
                scope.spawn(move || {
                    coordinator
                        .on_resident_facts_changed(&ResidentId::from(format!("R{i}")), as_of())
                        .unwrap();
                });
            }
        });

        for i in 0..16 {
            let aggregate = aggregate(coordinator.store(), &format!("H{i}")).unwrap();
            assert_eq!(aggregate.member_count, 1);
            assert_eq!(aggregate.household_name.as_deref(), Some("Mabini"));
        }
    }

    #[test]
    fn test_salary_change_racing_a_join_is_not_lost() {
        for _ in 0..300 {
            let coordinator = lone_resident();
            let start = Barrier::new(2);
            thread::scope(|scope| {
                scope.spawn(|| {
                    start.wait();
                    raise_r1(&coordinator);
                });
                scope.spawn(|| {
                    start.wait();
                    join_h1(&coordinator);
                });
            });

            let drift = coordinator.verify_household(&HouseholdId::from("H1")).unwrap();
            assert!(!drift.drifted, "stored {:?} vs fresh {:?}", drift.stored, drift.fresh);
            assert_eq!(drift.fresh.total_monthly_income, Centavos::from_pesos(5_000));
            assert!(!coordinator
                .verify_resident(&ResidentId::from("R1"), as_of())
                .unwrap()
                .drifted);
        }
    }

    #[test]
    fn test_join_waits_for_the_joining_resident() {
        let coordinator = lone_resident();
        let held = coordinator
            .locks()
            .acquire(&[EntityRef::Resident(ResidentId::from("R1"))])
            .unwrap();

        thread::scope(|scope| {
            let join = scope.spawn(|| join_h1(&coordinator));
            thread::sleep(Duration::from_millis(50));
            // The join holds H1 but not R1, so this write lands before it reads R1
            {
                let mut tx = coordinator.store().begin().unwrap();
                let facts = tx
                    .get_resident_facts(&ResidentId::from("R1"))
                    .unwrap()
                    .with_salary(Centavos::from_pesos(5_000));
                tx.put_resident(facts).unwrap();
                tx.commit().unwrap();
            }
            drop(held);
            join.join().unwrap();
        });

        assert_eq!(
            aggregate(coordinator.store(), "H1").unwrap().total_monthly_income,
            Centavos::from_pesos(5_000)
        );
        assert_eq!(coordinator.locks().live_slots(), 0);
    }
}
