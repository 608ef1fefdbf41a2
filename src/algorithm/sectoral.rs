//! Sectoral classification of residents
//!
//! Maps a resident's facts to the sectoral flags. Classification is pure: the
//! reference date is passed in once and every age-dependent flag in a profile
//! is computed against that same date.

use crate::config::ClassificationPolicy;
use crate::models::{EmploymentStatus, ResidentFacts, SectoralProfile};
use chrono::NaiveDate;

/// Computes sectoral profiles under a fixed classification policy
#[derive(Debug, Clone, Default)]
pub struct SectoralClassifier {
    policy: ClassificationPolicy,
}

impl SectoralClassifier {
    #[must_use]
    pub const fn new(policy: ClassificationPolicy) -> Self {
        Self { policy }
    }

    /// Classify a resident as of `as_of`
    #[must_use]
    pub fn classify(
        &self,
        facts: &ResidentFacts,
        has_migration_record: bool,
        as_of: NaiveDate,
    ) -> SectoralProfile {
        let age = facts.age_at(as_of);
        let employed = self.is_labor_force_employed(facts.employment_status);
        let out_of_school = facts.education_status.is_out_of_school();
        let tertiary = facts
            .highest_attainment
            .is_some_and(|attainment| attainment.is_tertiary());

        let (osc_min, osc_max) = self.policy.out_of_school_children_ages;
        let (osy_min, osy_max) = self.policy.out_of_school_youth_ages;

        SectoralProfile {
            resident_id: facts.id.clone(),
            is_labor_force_employed: employed,
            is_unemployed: matches!(
                facts.employment_status,
                EmploymentStatus::Unemployed | EmploymentStatus::LookingForWork
            ),
            is_out_of_school_children: in_band(age, osc_min, osc_max) && out_of_school,
            is_out_of_school_youth: in_band(age, osy_min, osy_max)
                && out_of_school
                && !tertiary
                && !employed,
            is_senior_citizen: age >= to_age(self.policy.senior_citizen_age),
            is_registered_senior_citizen: facts.registration.registered_senior_citizen,
            is_solo_parent: facts.registration.solo_parent,
            is_indigenous_people: facts.registration.indigenous_people,
            is_person_with_disability: facts.registration.person_with_disability,
            is_overseas_filipino_worker: facts.registration.overseas_filipino_worker,
            is_migrant: has_migration_record,
            computed_at: as_of,
        }
    }

    fn is_labor_force_employed(&self, status: EmploymentStatus) -> bool {
        match status {
            EmploymentStatus::Employed | EmploymentStatus::SelfEmployed => true,
            EmploymentStatus::Underemployed => self.policy.count_underemployed_as_employed,
            _ => false,
        }
    }
}

fn to_age(years: u32) -> i32 {
    i32::try_from(years).unwrap_or(i32::MAX)
}

fn in_band(age: i32, min: u32, max: u32) -> bool {
    (to_age(min)..=to_age(max)).contains(&age)
}
