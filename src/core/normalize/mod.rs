//! Record normalization
//!
//! Cleans one raw record at a time: whitespace and case folding of text
//! fields, strict date parsing, and numeric casting. There is no cross-record
//! state, so the pipeline runs this across a worker pool.
//!
//! Discharge-before-admission is rejected here rather than flagged after load;
//! dates are never swapped or otherwise repaired.

pub mod text;

use crate::domain::encounter::AdmissionType;
use crate::domain::errors::MalformedInput;
use crate::domain::record::RawRecord;
use chrono::NaiveDate;
use text::{collapse_whitespace, normalize_identity, title_case};

/// Default strict date format of the source dataset
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Oldest accepted age in years
pub const MAX_AGE: u32 = 130;

/// A cleaned record that still carries the identifying name
///
/// Only the key engine consumes this type; it turns the name into hashes and
/// drops it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub source_row: usize,
    /// Whitespace-collapsed, lowercased name
    pub identity: String,
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

/// Pure, stateless record normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    date_format: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMAT)
    }
}

impl Normalizer {
    /// Create a normalizer that parses dates with `date_format`
    pub fn new(date_format: impl Into<String>) -> Self {
        Self {
            date_format: date_format.into(),
        }
    }

    /// Normalize one raw record
    ///
    /// # Arguments
    ///
    /// * `source_row` - 1-based position of the record in its batch
    /// * `raw` - The record as received
    ///
    /// # Errors
    ///
    /// Returns the first [`MalformedInput`] found, checking columns in source
    /// order.
    pub fn normalize(
        &self,
        source_row: usize,
        raw: &RawRecord,
    ) -> Result<NormalizedRecord, MalformedInput> {
        let identity = normalize_identity(required("name", &raw.name)?);
        let age = parse_age(required("age", &raw.age)?)?;
        let gender = title_case(required("gender", &raw.gender)?);
        let blood_type = collapse_whitespace(required("blood_type", &raw.blood_type)?)
            .to_uppercase()
            .replace(' ', "");
        let medical_condition =
            title_case(required("medical_condition", &raw.medical_condition)?);
        let admission_date = self.parse_date(
            "date_of_admission",
            required("date_of_admission", &raw.date_of_admission)?,
        )?;
        let doctor = title_case(required("doctor", &raw.doctor)?);
        let hospital = title_case(required("hospital", &raw.hospital)?);
        let insurance_provider =
            title_case(required("insurance_provider", &raw.insurance_provider)?);
        let billing_amount = parse_amount(required("billing_amount", &raw.billing_amount)?)?;
        let room_number = parse_room_number(&raw.room_number)?;
        let admission_type = parse_admission_type(required("admission_type", &raw.admission_type)?)?;
        let discharge_date = self.parse_date(
            "discharge_date",
            required("discharge_date", &raw.discharge_date)?,
        )?;
        let medication = title_case(required("medication", &raw.medication)?);
        let test_results = title_case(required("test_results", &raw.test_results)?);

        if discharge_date < admission_date {
            return Err(MalformedInput::DischargeBeforeAdmission {
                admission: admission_date.to_string(),
                discharge: discharge_date.to_string(),
            });
        }

        Ok(NormalizedRecord {
            source_row,
            identity,
            age,
            gender,
            blood_type,
            medical_condition,
            admission_date,
            discharge_date,
            doctor,
            hospital,
            insurance_provider,
            billing_amount,
            room_number,
            admission_type,
            medication,
            test_results,
        })
    }

    /// Parse a date strictly
    ///
    /// The value must parse with the configured format and format back to
    /// exactly the same text, which rules out unpadded or partial dates.
    fn parse_date(&self, field: &'static str, value: &str) -> Result<NaiveDate, MalformedInput> {
        let malformed = || MalformedInput::MalformedDate {
            field,
            value: value.to_string(),
        };

        let date = NaiveDate::parse_from_str(value, &self.date_format).map_err(|_| malformed())?;
        if date.format(&self.date_format).to_string() != value {
            return Err(malformed());
        }
        Ok(date)
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, MalformedInput> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(MalformedInput::MissingField { field });
    }
    Ok(trimmed)
}

fn parse_age(value: &str) -> Result<u32, MalformedInput> {
    match value.parse::<u32>() {
        Ok(age) if age <= MAX_AGE => Ok(age),
        _ => Err(MalformedInput::InvalidAge {
            value: value.to_string(),
        }),
    }
}

fn parse_amount(value: &str) -> Result<f64, MalformedInput> {
    match value.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(MalformedInput::InvalidAmount {
            value: value.to_string(),
        }),
    }
}

fn parse_room_number(value: &str) -> Result<Option<u32>, MalformedInput> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| MalformedInput::InvalidRoomNumber {
            value: trimmed.to_string(),
        })
}

fn parse_admission_type(value: &str) -> Result<AdmissionType, MalformedInput> {
    value
        .parse::<AdmissionType>()
        .map_err(|_| MalformedInput::InvalidCategory {
            field: "admission_type",
            value: value.to_string(),
        })
}
