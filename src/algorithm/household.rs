//! Household aggregation
//!
//! Computes a household's summary from its active members. The aggregate is
//! always rebuilt from the full member set, never patched.

use crate::algorithm::income::IncomeBracketTable;
use crate::error::{RegistryError, Result};
use crate::models::{ActiveMember, Centavos, HouseholdAggregate, HouseholdId, ResidentRef};

/// Computes household aggregates against an income bracket table
#[derive(Debug, Clone, Default)]
pub struct HouseholdAggregator {
    brackets: IncomeBracketTable,
}

impl HouseholdAggregator {
    #[must_use]
    pub const fn new(brackets: IncomeBracketTable) -> Self {
        Self { brackets }
    }

    #[must_use]
    pub const fn brackets(&self) -> &IncomeBracketTable {
        &self.brackets
    }

    /// Aggregate a household's active members
    ///
    /// # Errors
    /// `Validation` when a member has a negative salary, the income total
    /// overflows, or `head` is set but is not among `members`.
    pub fn aggregate(
        &self,
        household_id: &HouseholdId,
        members: &[ActiveMember],
        head: Option<&ResidentRef>,
    ) -> Result<HouseholdAggregate> {
        if let Some(head) = head {
            if !members.iter().any(|m| m.resident_id == head.id) {
                return Err(RegistryError::invalid_household(
                    household_id,
                    format!("head {} is not an active member", head.id),
                ));
            }
        }
        if members.is_empty() {
            return Ok(HouseholdAggregate::empty(household_id.clone()));
        }

        let mut total = Centavos::ZERO;
        for member in members {
            let salary = member.monthly_salary.unwrap_or(Centavos::ZERO);
            if salary.is_negative() {
                return Err(RegistryError::invalid_resident(
                    &member.resident_id,
                    format!("negative monthly salary {salary}"),
                ));
            }
            total = total.checked_add(salary).ok_or_else(|| {
                RegistryError::invalid_household(household_id, "monthly income total overflows")
            })?;
        }

        let migrant_count = members.iter().filter(|m| m.profile.is_migrant).count();

        Ok(HouseholdAggregate {
            household_id: household_id.clone(),
            member_count: count_u32(members.len()),
            migrant_count: count_u32(migrant_count),
            total_monthly_income: total,
            income_class: Some(self.brackets.classify(total)),
            household_name: head.map(|h| h.last_name.clone()),
        })
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
