//! Per-household aggregate

use crate::models::types::{Centavos, HouseholdId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Household income class, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomeClass {
    Poor,
    LowIncome,
    LowerMiddle,
    Middle,
    UpperMiddle,
    UpperIncome,
    Rich,
}

impl IncomeClass {
    /// All classes in ascending order
    pub const ALL: [Self; 7] = [
        Self::Poor,
        Self::LowIncome,
        Self::LowerMiddle,
        Self::Middle,
        Self::UpperMiddle,
        Self::UpperIncome,
        Self::Rich,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Poor => "Poor",
            Self::LowIncome => "Low Income",
            Self::LowerMiddle => "Lower Middle Income",
            Self::Middle => "Middle Income",
            Self::UpperMiddle => "Upper Middle Income",
            Self::UpperIncome => "Upper Income",
            Self::Rich => "Rich",
        }
    }
}

impl fmt::Display for IncomeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of a household's active membership
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HouseholdAggregate {
    pub household_id: HouseholdId,
    pub member_count: u32,
    pub migrant_count: u32,
    pub total_monthly_income: Centavos,
    /// Bracket of `total_monthly_income`; `None` when the household has no members
    pub income_class: Option<IncomeClass>,
    /// Surname of the designated head; `None` when no head is assigned
    pub household_name: Option<String>,
}

impl HouseholdAggregate {
    /// Aggregate of a household without active members
    #[must_use]
    pub const fn empty(household_id: HouseholdId) -> Self {
        Self {
            household_id,
            member_count: 0,
            migrant_count: 0,
            total_monthly_income: Centavos::ZERO,
            income_class: None,
            household_name: None,
        }
    }
}
