//! Per-resident sectoral classification

use crate::models::types::ResidentId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sectoral flags derived for one resident as of `computed_at`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectoralProfile {
    pub resident_id: ResidentId,
    pub is_labor_force_employed: bool,
    pub is_unemployed: bool,
    /// Aged 6 to 14 and out of school
    pub is_out_of_school_children: bool,
    /// Youth band, out of school, no tertiary attainment and not employed
    pub is_out_of_school_youth: bool,
    /// Aged 60 or over
    pub is_senior_citizen: bool,
    pub is_registered_senior_citizen: bool,
    pub is_solo_parent: bool,
    pub is_indigenous_people: bool,
    pub is_person_with_disability: bool,
    pub is_overseas_filipino_worker: bool,
    /// Has a migration record
    pub is_migrant: bool,
    /// Reference date used for the age-dependent flags
    pub computed_at: NaiveDate,
}

impl SectoralProfile {
    /// Whether both profiles carry the same flags, ignoring `computed_at`
    #[must_use]
    pub fn same_flags(&self, other: &Self) -> bool {
        self.flags() == other.flags()
    }

    /// Flags in declaration order
    #[must_use]
    pub const fn flags(&self) -> [bool; 11] {
        [
            self.is_labor_force_employed,
            self.is_unemployed,
            self.is_out_of_school_children,
            self.is_out_of_school_youth,
            self.is_senior_citizen,
            self.is_registered_senior_citizen,
            self.is_solo_parent,
            self.is_indigenous_people,
            self.is_person_with_disability,
            self.is_overseas_filipino_worker,
            self.is_migrant,
        ]
    }
}
