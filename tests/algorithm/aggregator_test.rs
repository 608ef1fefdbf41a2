#[cfg(test)]
mod tests {
    use crate::utils::{as_of, resident_aged};
    use registry_sync::{
        ActiveMember, Centavos, HouseholdAggregator, HouseholdId, IncomeBracket,
        IncomeBracketTable, IncomeClass, ResidentRef, SectoralClassifier,
    };

    fn member(id: &str, salary: i64, migrant: bool) -> ActiveMember {
        let facts = resident_aged(id, "Aquino", 40).with_salary(Centavos::from_pesos(salary));
        ActiveMember {
            resident_id: facts.id.clone(),
            monthly_salary: facts.monthly_salary,
            profile: SectoralClassifier::default().classify(&facts, migrant, as_of()),
        }
    }

    #[test]
    fn test_two_member_migrant_scenario() {
        let aggregator = HouseholdAggregator::default();
        let household = HouseholdId::from("H1");
        let members = [member("A", 15_000, false), member("B", 0, true)];
        let aggregate = aggregator.aggregate(&household, &members, None).unwrap();

        assert_eq!(aggregate.member_count, 2);
        assert_eq!(aggregate.migrant_count, 1);
        assert_eq!(aggregate.total_monthly_income, Centavos::from_pesos(15_000));
        assert_eq!(
            aggregate.income_class,
            Some(aggregator.brackets().classify(Centavos::from_pesos(15_000)))
        );
        assert_eq!(aggregate.income_class, Some(IncomeClass::LowIncome));
    }

    #[test]
    fn test_income_is_additive() {
        let aggregator = HouseholdAggregator::default();
        let household = HouseholdId::from("H1");
        let mut members = vec![
            member("A", 9_250, false),
            member("B", 12_345, false),
            member("C", 1, false),
        ];
        let before = aggregator.aggregate(&household, &members, None).unwrap();
        assert_eq!(before.total_monthly_income, Centavos::from_pesos(9_250 + 12_345 + 1));

        members.push(member("D", 4_321, false));
        let after = aggregator.aggregate(&household, &members, None).unwrap();
        assert_eq!(
            after.total_monthly_income.value() - before.total_monthly_income.value(),
            Centavos::from_pesos(4_321).value()
        );
        assert_eq!(after.member_count, before.member_count + 1);
    }

    #[test]
    fn test_centavo_salaries_sum_exactly() {
        let aggregator = HouseholdAggregator::default();
        let household = HouseholdId::from("H1");
        let mut a = member("A", 0, false);
        a.monthly_salary = Some(Centavos(10));
        let mut b = member("B", 0, false);
        b.monthly_salary = Some(Centavos(20));
        let aggregate = aggregator.aggregate(&household, &[a, b], None).unwrap();
        assert_eq!(aggregate.total_monthly_income, Centavos(30));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let aggregator = HouseholdAggregator::default();
        let household = HouseholdId::from("H1");
        let members = [member("A", 20_000, true), member("B", 5_000, false)];
        let head = ResidentRef {
            id: members[0].resident_id.clone(),
            last_name: "Aquino".to_string(),
        };
        let first = aggregator.aggregate(&household, &members, Some(&head)).unwrap();
        let second = aggregator.aggregate(&household, &members, Some(&head)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.household_name.as_deref(), Some("Aquino"));
    }

    #[test]
    fn test_injected_bracket_table() {
        let table = IncomeBracketTable::new(vec![
            IncomeBracket {
                class: IncomeClass::Poor,
                lower_bound: Centavos::ZERO,
            },
            IncomeBracket {
                class: IncomeClass::Middle,
                lower_bound: Centavos::from_pesos(10_000),
            },
        ])
        .unwrap();
        let aggregator = HouseholdAggregator::new(table);
        let household = HouseholdId::from("H1");

        let low = aggregator
            .aggregate(&household, &[member("A", 9_999, false)], None)
            .unwrap();
        assert_eq!(low.income_class, Some(IncomeClass::Poor));

        let high = aggregator
            .aggregate(&household, &[member("A", 10_000, false)], None)
            .unwrap();
        assert_eq!(high.income_class, Some(IncomeClass::Middle));
    }
}
