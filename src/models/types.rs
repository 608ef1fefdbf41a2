//! Common domain type definitions
//!
//! This module contains identifiers, money, and the enum vocabularies used
//! across resident and household models.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resident identifier as issued by the registry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidentId(pub String);

/// Household identifier as issued by the registry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseholdId(pub String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// Borrow the raw identifier
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_id!(ResidentId);
impl_id!(HouseholdId);

/// Monetary amount in centavos (1/100 peso)
///
/// Kept as an integer so household income sums are exact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Centavos(pub i64);

impl Centavos {
    /// Zero pesos
    pub const ZERO: Self = Self(0);

    /// Amount from whole pesos
    #[must_use]
    pub const fn from_pesos(pesos: i64) -> Self {
        Self(pesos * 100)
    }

    /// Raw centavo value
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition, `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Display for Centavos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Employment status as recorded on the resident profile
///
/// Deserializes from any code [`From<&str>`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum EmploymentStatus {
    /// Wage or salary employment
    Employed,
    /// Own-account work or business
    SelfEmployed,
    /// Working but wanting more hours
    Underemployed,
    /// Without work
    Unemployed,
    /// Without work and actively searching
    LookingForWork,
    /// Full-time student
    Student,
    /// Retired from work
    Retired,
    /// Managing the home, not seeking work
    Homemaker,
    /// Unable to work due to disability
    Disabled,
    /// Outside the labor force for other reasons
    NotInLaborForce,
    /// Not recorded
    Unknown,
}

impl From<&str> for EmploymentStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "employed" | "wage-employed" => Self::Employed,
            "self-employed" | "own-account" => Self::SelfEmployed,
            "underemployed" => Self::Underemployed,
            "unemployed" => Self::Unemployed,
            "looking-for-work" | "seeking-work" => Self::LookingForWork,
            "student" => Self::Student,
            "retired" => Self::Retired,
            "homemaker" => Self::Homemaker,
            "disabled" => Self::Disabled,
            "not-in-labor-force" => Self::NotInLaborForce,
            _ => Self::Unknown,
        }
    }
}

/// Current schooling status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum EducationStatus {
    /// Enrolled and attending
    CurrentlyStudying,
    /// Not enrolled
    NotStudying,
    /// Finished the last program attended
    Graduated,
    /// Left a program before finishing
    DroppedOut,
    /// Not recorded
    Unknown,
}

impl EducationStatus {
    /// Whether the status counts as out of school
    #[must_use]
    pub const fn is_out_of_school(self) -> bool {
        matches!(self, Self::NotStudying | Self::DroppedOut)
    }
}

impl From<&str> for EducationStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "currently-studying" | "studying" | "enrolled" => Self::CurrentlyStudying,
            "not-studying" => Self::NotStudying,
            "graduated" | "graduate" => Self::Graduated,
            "dropped-out" | "dropout" => Self::DroppedOut,
            _ => Self::Unknown,
        }
    }
}

macro_rules! impl_from_string {
    ($name:ident) => {
        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }
    };
}

impl_from_string!(EmploymentStatus);
impl_from_string!(EducationStatus);
impl_from_string!(Relationship);

/// Highest educational attainment, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EducationalAttainment {
    /// No formal schooling
    NoFormalEducation,
    /// Elementary level
    Elementary,
    /// High-school level
    HighSchool,
    /// Technical-vocational program
    Vocational,
    /// College level
    College,
    /// Post-graduate level
    PostGraduate,
}

impl EducationalAttainment {
    /// Whether the attainment is at least college level
    #[must_use]
    pub const fn is_tertiary(self) -> bool {
        matches!(self, Self::College | Self::PostGraduate)
    }
}

impl EducationalAttainment {
    /// Parse a recorded attainment label, `None` when unrecognized
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "none" | "no-formal-education" => Some(Self::NoFormalEducation),
            "elementary" => Some(Self::Elementary),
            "high-school" | "highschool" => Some(Self::HighSchool),
            "vocational" => Some(Self::Vocational),
            "college" => Some(Self::College),
            "post-graduate" | "postgraduate" => Some(Self::PostGraduate),
            _ => None,
        }
    }
}

/// Relationship of a member to the household head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum Relationship {
    Head,
    Spouse,
    Child,
    Parent,
    Sibling,
    Grandchild,
    Grandparent,
    OtherRelative,
    NonRelative,
    Unknown,
}

impl From<&str> for Relationship {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "head" => Self::Head,
            "spouse" | "partner" => Self::Spouse,
            "child" | "son" | "daughter" => Self::Child,
            "parent" | "father" | "mother" => Self::Parent,
            "sibling" | "brother" | "sister" => Self::Sibling,
            "grandchild" => Self::Grandchild,
            "grandparent" => Self::Grandparent,
            "other-relative" | "relative" => Self::OtherRelative,
            "non-relative" | "boarder" => Self::NonRelative,
            _ => Self::Unknown,
        }
    }
}
