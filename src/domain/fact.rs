//! Encounter fact table row

use super::dimension::DimensionKind;
use super::encounter::{AdmissionType, AgeGroup, Season};
use super::ids::{EncounterKey, SurrogateKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row per encounter key
///
/// Every foreign key resolved to an existing dimension row when the row was
/// merged. Load metadata is deliberately absent so that re-merging an
/// unchanged encounter compares equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactEncounterRow {
    pub encounter_key: EncounterKey,

    // Foreign keys
    pub patient_key: SurrogateKey,
    pub admission_date_key: SurrogateKey,
    pub discharge_date_key: SurrogateKey,
    pub provider_key: SurrogateKey,
    pub facility_key: SurrogateKey,
    pub diagnosis_key: SurrogateKey,
    pub medication_key: SurrogateKey,
    pub insurance_key: SurrogateKey,

    // Measures and flags
    pub admission_date: NaiveDate,
    pub discharge_date: NaiveDate,
    pub age: u32,
    pub age_group: AgeGroup,
    pub billing_amount: f64,
    pub room_number: Option<u32>,
    pub length_of_stay: i64,
    pub cost_per_day: Option<f64>,
    pub season: Season,
    pub admission_type: AdmissionType,
    pub is_emergency: bool,
    pub test_results: String,
    pub days_since_last_admission: Option<i64>,
    pub is_readmission: bool,
    pub previous_admission_count: u32,
}

/// Foreign key columns of the fact table and the dimension each references
///
/// `None` marks the patient dimension.
pub const FACT_FOREIGN_KEYS: [(&str, Option<DimensionKind>); 8] = [
    ("patient_key", None),
    ("admission_date_key", Some(DimensionKind::Date)),
    ("discharge_date_key", Some(DimensionKind::Date)),
    ("provider_key", Some(DimensionKind::Provider)),
    ("facility_key", Some(DimensionKind::Facility)),
    ("diagnosis_key", Some(DimensionKind::Diagnosis)),
    ("medication_key", Some(DimensionKind::Medication)),
    ("insurance_key", Some(DimensionKind::Insurance)),
];

impl FactEncounterRow {
    /// Key stored in the column for `kind`
    ///
    /// The date dimension is referenced twice; this returns the admission
    /// date key for it.
    pub fn key_for(&self, kind: DimensionKind) -> SurrogateKey {
        match kind {
            DimensionKind::Date => self.admission_date_key,
            DimensionKind::Provider => self.provider_key,
            DimensionKind::Facility => self.facility_key,
            DimensionKind::Diagnosis => self.diagnosis_key,
            DimensionKind::Medication => self.medication_key,
            DimensionKind::Insurance => self.insurance_key,
        }
    }
}
