//! Raw source record
//!
//! One row exactly as the external loader handed it over. Every field is kept
//! as text; casting happens in the normalizer.

use serde::{Deserialize, Serialize};

/// One raw encounter row
///
/// Column names match the source dataset headers so a CSV reader can
/// deserialize directly into this type.
///
/// # Examples
///
/// ```
/// use meridian::domain::record::RawRecord;
///
/// let record = RawRecord::builder()
///     .name("Bobby JacksOn")
///     .date_of_admission("2024-01-31")
///     .discharge_date("2024-02-02")
///     .billing_amount("18856.28")
///     .build();
///
/// assert_eq!(record.name, "Bobby JacksOn");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Age", default)]
    pub age: String,

    #[serde(rename = "Gender", default)]
    pub gender: String,

    #[serde(rename = "Blood Type", default)]
    pub blood_type: String,

    #[serde(rename = "Medical Condition", default)]
    pub medical_condition: String,

    #[serde(rename = "Date of Admission", default)]
    pub date_of_admission: String,

    #[serde(rename = "Doctor", default)]
    pub doctor: String,

    #[serde(rename = "Hospital", default)]
    pub hospital: String,

    #[serde(rename = "Insurance Provider", default)]
    pub insurance_provider: String,

    #[serde(rename = "Billing Amount", default)]
    pub billing_amount: String,

    #[serde(rename = "Room Number", default)]
    pub room_number: String,

    #[serde(rename = "Admission Type", default)]
    pub admission_type: String,

    #[serde(rename = "Discharge Date", default)]
    pub discharge_date: String,

    #[serde(rename = "Medication", default)]
    pub medication: String,

    #[serde(rename = "Test Results", default)]
    pub test_results: String,
}

impl RawRecord {
    /// Creates a new builder for constructing a RawRecord
    pub fn builder() -> RawRecordBuilder {
        RawRecordBuilder::default()
    }
}

/// Builder for RawRecord
///
/// Unset fields stay empty, which the normalizer rejects for required
/// columns. Tests and ad-hoc loaders use this instead of struct literals.
#[derive(Debug, Default)]
pub struct RawRecordBuilder {
    record: RawRecord,
}

macro_rules! raw_setters {
    ($($field:ident),* $(,)?) => {
        $(
            #[doc = concat!("Sets the `", stringify!($field), "` column")]
            pub fn $field(mut self, value: impl Into<String>) -> Self {
                self.record.$field = value.into();
                self
            }
        )*
    };
}

impl RawRecordBuilder {
    /// Creates a new RawRecordBuilder
    pub fn new() -> Self {
        Self::default()
    }

    raw_setters!(
        name,
        age,
        gender,
        blood_type,
        medical_condition,
        date_of_admission,
        doctor,
        hospital,
        insurance_provider,
        billing_amount,
        room_number,
        admission_type,
        discharge_date,
        medication,
        test_results,
    );

    /// Builds the RawRecord
    pub fn build(self) -> RawRecord {
        self.record
    }
}
