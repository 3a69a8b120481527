//! Encounter models
//!
//! [`CleanedEncounter`] is a raw record after normalization and keying.
//! [`EnrichedEncounter`] adds the per-record and per-patient derived features
//! that end up as fact measures.

use super::ids::{EncounterKey, PatientIdentityHash};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Admission category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionType {
    Emergency,
    Urgent,
    Elective,
}

impl AdmissionType {
    /// Whether this admission counts as an emergency
    pub fn is_emergency(self) -> bool {
        matches!(self, Self::Emergency)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "Emergency",
            Self::Urgent => "Urgent",
            Self::Elective => "Elective",
        }
    }
}

impl FromStr for AdmissionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "emergency" => Ok(Self::Emergency),
            "urgent" => Ok(Self::Urgent),
            "elective" => Ok(Self::Elective),
            other => Err(format!(
                "Invalid admission type: {other}. Expected 'Emergency', 'Urgent' or 'Elective'"
            )),
        }
    }
}

impl fmt::Display for AdmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed age bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "0-17")]
    Child,
    #[serde(rename = "18-30")]
    YoungAdult,
    #[serde(rename = "31-50")]
    Adult,
    #[serde(rename = "51-70")]
    MiddleAged,
    #[serde(rename = "70+")]
    Senior,
}

impl AgeGroup {
    /// Band for an age in years
    pub fn from_age(age: u32) -> Self {
        match age {
            0..=17 => Self::Child,
            18..=30 => Self::YoungAdult,
            31..=50 => Self::Adult,
            51..=70 => Self::MiddleAged,
            _ => Self::Senior,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Child => "0-17",
            Self::YoungAdult => "18-30",
            Self::Adult => "31-50",
            Self::MiddleAged => "51-70",
            Self::Senior => "70+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Meteorological season of a date (northern hemisphere)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub fn from_date(date: NaiveDate) -> Self {
        match date.month() {
            12 | 1 | 2 => Self::Winter,
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            _ => Self::Autumn,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Autumn => "Autumn",
        };
        f.write_str(label)
    }
}

/// A normalized, keyed encounter
///
/// The identifying name is gone by the time this type exists; only
/// `patient_identity_hash` links encounters of the same patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedEncounter {
    /// Deterministic key of identity + admission date
    pub encounter_key: EncounterKey,

    /// One-way hash of the identifying name
    pub patient_identity_hash: PatientIdentityHash,

    /// 1-based position of the source row in the batch, for triage
    pub source_row: usize,

    pub age: u32,
    pub gender: String,
    pub blood_type: String,
    pub medical_condition: String,
    pub admission_date: NaiveDate,
    pub discharge_date: NaiveDate,
    pub doctor: String,
    pub hospital: String,
    pub insurance_provider: String,
    pub billing_amount: f64,
    pub room_number: Option<u32>,
    pub admission_type: AdmissionType,
    pub medication: String,
    pub test_results: String,
}

/// A cleaned encounter plus derived features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEncounter {
    pub encounter: CleanedEncounter,

    /// Discharge minus admission, in days (never negative)
    pub length_of_stay: i64,

    /// Billing amount per day; `None` when the stay is zero days
    pub cost_per_day: Option<f64>,

    pub age_group: AgeGroup,
    pub season: Season,
    pub is_emergency: bool,

    /// Days since the same patient's immediately preceding admission
    pub days_since_last_admission: Option<i64>,

    /// A preceding admission exists within the readmission window
    pub is_readmission: bool,

    /// Number of strictly earlier admissions of this patient in the batch
    pub previous_admission_count: u32,
}

impl EnrichedEncounter {
    pub fn encounter_key(&self) -> &EncounterKey {
        &self.encounter.encounter_key
    }

    pub fn patient_identity_hash(&self) -> &PatientIdentityHash {
        &self.encounter.patient_identity_hash
    }
}
