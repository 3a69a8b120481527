//! Reference dimension models
//!
//! Reference dimensions hold one row per distinct natural key observed in any
//! loaded batch. Rows are append-only; the aggregate attributes are recomputed
//! from the fact table after every merge.

use super::encounter::Season;
use super::ids::SurrogateKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The reference dimensions of the warehouse
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Date,
    Provider,
    Facility,
    Diagnosis,
    Medication,
    Insurance,
}

impl DimensionKind {
    /// Every reference dimension, in build order
    pub const ALL: [DimensionKind; 6] = [
        DimensionKind::Date,
        DimensionKind::Provider,
        DimensionKind::Facility,
        DimensionKind::Diagnosis,
        DimensionKind::Medication,
        DimensionKind::Insurance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Provider => "provider",
            Self::Facility => "facility",
            Self::Diagnosis => "diagnosis",
            Self::Medication => "medication",
            Self::Insurance => "insurance",
        }
    }

    /// Name of the table consumers read
    pub fn table_name(self) -> String {
        format!("dim_{}", self.as_str())
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("Unknown dimension: {s}"))
    }
}

/// One row of a reference dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDimensionRow {
    pub surrogate_key: SurrogateKey,
    pub natural_key: String,
    pub attributes: DimensionAttributes,
}

impl ReferenceDimensionRow {
    pub fn kind(&self) -> DimensionKind {
        self.attributes.kind()
    }
}

/// Descriptive and aggregate attributes, per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum DimensionAttributes {
    Date(DateAttributes),
    Provider(ProviderAttributes),
    Facility(FacilityAttributes),
    Diagnosis(DiagnosisAttributes),
    Medication(MedicationAttributes),
    Insurance(InsuranceAttributes),
}

impl DimensionAttributes {
    pub fn kind(&self) -> DimensionKind {
        match self {
            Self::Date(_) => DimensionKind::Date,
            Self::Provider(_) => DimensionKind::Provider,
            Self::Facility(_) => DimensionKind::Facility,
            Self::Diagnosis(_) => DimensionKind::Diagnosis,
            Self::Medication(_) => DimensionKind::Medication,
            Self::Insurance(_) => DimensionKind::Insurance,
        }
    }
}

/// Calendar attributes plus admission aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateAttributes {
    pub date: NaiveDate,
    pub year: i32,
    pub quarter: u32,
    pub month: u32,
    pub month_name: String,
    /// ISO weekday, Monday = 1
    pub day_of_week: u32,
    pub is_weekend: bool,
    pub season: Season,
    pub admissions: u64,
    pub total_billing: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttributes {
    pub total_encounters: u64,
    pub avg_billing: f64,
    pub avg_length_of_stay: f64,
    /// Most frequent diagnosis among the provider's encounters
    pub primary_condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityAttributes {
    pub total_encounters: u64,
    pub total_revenue: f64,
    pub avg_billing: f64,
    pub avg_length_of_stay: f64,
    /// Highest room number seen, as a bed count estimate
    pub bed_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisAttributes {
    pub total_cases: u64,
    pub avg_cost: f64,
    pub avg_length_of_stay: f64,
    pub avg_patient_age: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationAttributes {
    pub total_prescriptions: u64,
    /// Up to three most common conditions treated with this medication
    pub common_conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsuranceAttributes {
    pub total_covered: u64,
    pub avg_billing: f64,
    pub total_billing: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_kind_round_trip() {
        for kind in DimensionKind::ALL {
            assert_eq!(kind.as_str().parse::<DimensionKind>().unwrap(), kind);
        }
        assert!("ward".parse::<DimensionKind>().is_err());
    }

    #[test]
    fn test_table_name() {
        assert_eq!(DimensionKind::Medication.table_name(), "dim_medication");
    }

    #[test]
    fn test_attributes_are_tagged_by_dimension() {
        let row = ReferenceDimensionRow {
            surrogate_key: SurrogateKey::new(3),
            natural_key: "Aetna".to_string(),
            attributes: DimensionAttributes::Insurance(InsuranceAttributes::default()),
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["attributes"]["dimension"], "insurance");
        assert_eq!(row.kind(), DimensionKind::Insurance);
    }
}
