//! CSV encounter source

use crate::domain::{RawRecord, Result, WarehouseError};
use csv::{ByteRecord, ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

/// Columns without which no row can be keyed
const REQUIRED_COLUMNS: [&str; 3] = ["Name", "Date of Admission", "Discharge Date"];

/// Reads a CSV file of raw encounters
///
/// Values are trimmed and kept as text. Short rows are accepted; their
/// missing columns come through empty and are rejected later by the
/// normalizer if required.
///
/// # Errors
///
/// Returns [`WarehouseError::Input`] if the file cannot be opened or read, or
/// a required column is missing from the header.
pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        WarehouseError::Input(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let records = read_csv(file)?;
    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Read input records"
    );
    Ok(records)
}

/// Reads raw encounters from any CSV byte stream
///
/// Rows are matched to columns by header position. Missing trailing values
/// come through empty, extra values are ignored, and bytes that are not
/// UTF-8 are replaced, so a malformed row always reaches the normalizer as a
/// record it can reject on its own.
///
/// # Errors
///
/// Returns [`WarehouseError::Input`] if the header lacks a required column or
/// the stream itself cannot be read.
pub fn read_csv<R: Read>(input: R) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|header| {
            String::from_utf8_lossy(header)
                .trim_matches('\u{feff}')
                .trim()
                .to_string()
        })
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|header| header == column))
        .collect();
    if !missing.is_empty() {
        return Err(WarehouseError::Input(format!(
            "Input is missing required column(s): {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    let mut row = ByteRecord::new();
    let mut short_rows = 0usize;
    while reader.read_byte_record(&mut row)? {
        let row_number = records.len() + 1;
        if row.len() < headers.len() {
            short_rows += 1;
            tracing::debug!(
                row = row_number,
                fields = row.len(),
                columns = headers.len(),
                "Padding short CSV row"
            );
        }
        records.push(record_from_row(&headers, &row, row_number));
    }

    if short_rows > 0 {
        tracing::warn!(short_rows, "CSV rows with missing trailing values were padded");
    }
    Ok(records)
}

/// Builds a record by header position
fn record_from_row(headers: &[String], row: &ByteRecord, row_number: usize) -> RawRecord {
    let mut record = RawRecord::default();
    for (header, value) in headers.iter().zip(row.iter()) {
        let Some(slot) = column_slot(&mut record, header) else {
            continue;
        };
        *slot = match std::str::from_utf8(value) {
            Ok(text) => text.to_string(),
            Err(_) => {
                tracing::warn!(row = row_number, column = %header, "Replaced non-UTF-8 bytes");
                String::from_utf8_lossy(value).into_owned()
            }
        };
    }
    record
}

/// Field of `record` that a header names, if any
fn column_slot<'a>(record: &'a mut RawRecord, header: &str) -> Option<&'a mut String> {
    let slot = match header {
        "Name" => &mut record.name,
        "Age" => &mut record.age,
        "Gender" => &mut record.gender,
        "Blood Type" => &mut record.blood_type,
        "Medical Condition" => &mut record.medical_condition,
        "Date of Admission" => &mut record.date_of_admission,
        "Doctor" => &mut record.doctor,
        "Hospital" => &mut record.hospital,
        "Insurance Provider" => &mut record.insurance_provider,
        "Billing Amount" => &mut record.billing_amount,
        "Room Number" => &mut record.room_number,
        "Admission Type" => &mut record.admission_type,
        "Discharge Date" => &mut record.discharge_date,
        "Medication" => &mut record.medication,
        "Test Results" => &mut record.test_results,
        _ => return None,
    };
    Some(slot)
}
