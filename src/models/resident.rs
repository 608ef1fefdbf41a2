//! Resident entity model
//!
//! A resident's raw facts as kept by the registry. Everything the engine
//! derives for a resident is computed from these facts plus the presence of a
//! migration record.

use super::types::{
    Centavos, EducationStatus, EducationalAttainment, EmploymentStatus, ResidentId,
};
use crate::error::{RegistryError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Administrative registrations recorded against a resident
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationFlags {
    /// Holds an OSCA senior citizen registration
    pub registered_senior_citizen: bool,
    /// Holds a solo parent ID
    pub solo_parent: bool,
    /// Registered as a member of an indigenous people
    pub indigenous_people: bool,
    /// Holds a PWD ID
    pub person_with_disability: bool,
    /// Registered overseas Filipino worker
    pub overseas_filipino_worker: bool,
}

/// Raw facts for a single resident
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentFacts {
    /// Registry identifier
    pub id: ResidentId,
    /// Given name
    pub first_name: String,
    /// Surname, used to name the household the resident heads
    pub last_name: String,
    /// Date of birth
    pub birth_date: NaiveDate,
    /// Employment status
    #[serde(default = "unknown_employment")]
    pub employment_status: EmploymentStatus,
    /// Current schooling status
    #[serde(default = "unknown_education")]
    pub education_status: EducationStatus,
    /// Highest completed level, if recorded; unrecognized labels read as unrecorded
    #[serde(default, deserialize_with = "attainment_label")]
    pub highest_attainment: Option<EducationalAttainment>,
    /// Monthly salary, if recorded
    #[serde(default)]
    pub monthly_salary: Option<Centavos>,
    /// Administrative registrations
    #[serde(default)]
    pub registration: RegistrationFlags,
}

const fn unknown_employment() -> EmploymentStatus {
    EmploymentStatus::Unknown
}

const fn unknown_education() -> EducationStatus {
    EducationStatus::Unknown
}

fn attainment_label<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<EducationalAttainment>, D::Error>
where
    D: Deserializer<'de>,
{
    let label = Option::<String>::deserialize(deserializer)?;
    Ok(label.as_deref().and_then(EducationalAttainment::parse))
}

impl ResidentFacts {
    /// Create a resident with minimal required information
    #[must_use]
    pub fn new(
        id: impl Into<ResidentId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        birth_date: NaiveDate,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            birth_date,
            employment_status: EmploymentStatus::Unknown,
            education_status: EducationStatus::Unknown,
            highest_attainment: None,
            monthly_salary: None,
            registration: RegistrationFlags::default(),
        }
    }

    #[must_use]
    pub fn with_employment(mut self, status: EmploymentStatus) -> Self {
        self.employment_status = status;
        self
    }

    #[must_use]
    pub fn with_education(
        mut self,
        status: EducationStatus,
        attainment: Option<EducationalAttainment>,
    ) -> Self {
        self.education_status = status;
        self.highest_attainment = attainment;
        self
    }

    #[must_use]
    pub fn with_salary(mut self, salary: Centavos) -> Self {
        self.monthly_salary = Some(salary);
        self
    }

    #[must_use]
    pub fn with_registration(mut self, registration: RegistrationFlags) -> Self {
        self.registration = registration;
        self
    }

    /// Age in completed years at `reference_date`
    ///
    /// Negative when `reference_date` precedes the birth date. A resident born
    /// on 29 February turns a year older on 1 March in common years.
    #[must_use]
    pub fn age_at(&self, reference_date: NaiveDate) -> i32 {
        let years = reference_date.year() - self.birth_date.year();
        if (reference_date.month(), reference_date.day())
            < (self.birth_date.month(), self.birth_date.day())
        {
            years - 1
        } else {
            years
        }
    }

    /// Salary treated as zero when not recorded
    #[must_use]
    pub fn salary_or_zero(&self) -> Centavos {
        self.monthly_salary.unwrap_or(Centavos::ZERO)
    }

    /// Check the facts are well-formed for classification as of `as_of`
    pub fn validate(&self, as_of: NaiveDate) -> Result<()> {
        if self.monthly_salary.is_some_and(Centavos::is_negative) {
            return Err(RegistryError::invalid_resident(
                &self.id,
                format!("negative monthly salary {}", self.salary_or_zero()),
            ));
        }
        if self.birth_date > as_of {
            return Err(RegistryError::invalid_resident(
                &self.id,
                format!("birth date {} is after {as_of}", self.birth_date),
            ));
        }
        if self.last_name.trim().is_empty() {
            return Err(RegistryError::invalid_resident(&self.id, "empty surname"));
        }
        Ok(())
    }
}

/// Record of a resident having moved in from elsewhere
///
/// Only its presence matters to classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Resident the record belongs to
    pub resident_id: ResidentId,
    /// Previous address, free text
    #[serde(default)]
    pub previous_address: Option<String>,
    /// Date the resident arrived
    #[serde(default)]
    pub date_of_transfer: Option<NaiveDate>,
    /// Reason given for moving
    #[serde(default)]
    pub reason: Option<String>,
}

impl MigrationRecord {
    #[must_use]
    pub fn new(resident_id: impl Into<ResidentId>) -> Self {
        Self {
            resident_id: resident_id.into(),
            previous_address: None,
            date_of_transfer: None,
            reason: None,
        }
    }
}
