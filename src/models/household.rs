//! Household and membership models
//!
//! A household is a registry unit with an optional designated head. Residents
//! belong to households through membership links; at most one link per
//! resident is active at any time.

use super::derived::SectoralProfile;
use super::types::{Centavos, HouseholdId, Relationship, ResidentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Household record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    /// Registry identifier
    pub id: HouseholdId,
    /// Designated head, if assigned
    #[serde(default)]
    pub head: Option<ResidentId>,
    /// Street address, free text
    #[serde(default)]
    pub address: Option<String>,
}

impl Household {
    #[must_use]
    pub fn new(id: impl Into<HouseholdId>) -> Self {
        Self {
            id: id.into(),
            head: None,
            address: None,
        }
    }

    /// Set the designated head
    #[must_use]
    pub fn with_head(mut self, head: impl Into<ResidentId>) -> Self {
        self.head = Some(head.into());
        self
    }
}

/// Link between a household and one of its residents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMembership {
    pub household_id: HouseholdId,
    pub resident_id: ResidentId,
    /// Relationship to the household head
    pub relationship: Relationship,
    /// Whether the link is currently in effect
    pub is_active: bool,
    #[serde(default)]
    pub move_in_date: Option<NaiveDate>,
    #[serde(default)]
    pub move_out_date: Option<NaiveDate>,
}

impl HouseholdMembership {
    /// Create an active membership
    #[must_use]
    pub fn active(
        household_id: impl Into<HouseholdId>,
        resident_id: impl Into<ResidentId>,
        relationship: Relationship,
    ) -> Self {
        Self {
            household_id: household_id.into(),
            resident_id: resident_id.into(),
            relationship,
            is_active: true,
            move_in_date: None,
            move_out_date: None,
        }
    }

    #[must_use]
    pub fn moved_in(mut self, date: NaiveDate) -> Self {
        self.move_in_date = Some(date);
        self
    }

    /// Close the link as of `date`
    pub fn deactivate(&mut self, date: NaiveDate) {
        self.is_active = false;
        self.move_out_date = Some(date);
    }

    /// Storage key of the link
    #[must_use]
    pub fn key(&self) -> (HouseholdId, ResidentId) {
        (self.household_id.clone(), self.resident_id.clone())
    }
}

/// Reference to a resident by id and surname
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResidentRef {
    pub id: ResidentId,
    pub last_name: String,
}

/// An active household member as seen by aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveMember {
    pub resident_id: ResidentId,
    /// Recorded monthly salary, missing counts as zero
    pub monthly_salary: Option<Centavos>,
    /// The member's current sectoral profile
    pub profile: SectoralProfile,
}
