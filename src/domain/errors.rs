//! Domain error types
//!
//! This module defines the error hierarchy for Meridian. Batch-level failures
//! are [`WarehouseError`]s and propagate with `?`. Record-level problems are
//! [`MalformedInput`] values that the pipeline collects into the run report
//! instead of propagating, so one bad row never aborts a batch.

use thiserror::Error;

/// Main Meridian error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Storage backend errors (reading or writing warehouse tables)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted state is inconsistent with the requested run
    #[error("State management error: {0}")]
    State(String),

    /// Input source errors (unreadable file, broken CSV framing)
    #[error("Input error: {0}")]
    Input(String),

    /// Pipeline stage failures (worker pool, task join)
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Fatal quality checks reported violations
    #[error("Invariant violation: {} fatal check(s) failed: {}", .checks.len(), .checks.join(", "))]
    InvariantViolation { checks: Vec<String> },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Record-level cleaning failures
///
/// A record that fails normalization is rejected with one of these and the
/// batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInput {
    /// A date field could not be parsed strictly
    #[error("Malformed date in '{field}': '{value}'")]
    MalformedDate { field: &'static str, value: String },

    /// The billing amount is negative, non-finite, or not a number
    #[error("Invalid amount: '{value}'")]
    InvalidAmount { value: String },

    /// Age is not an integer in the accepted range
    #[error("Invalid age: '{value}'")]
    InvalidAge { value: String },

    /// Room number is present but not a non-negative integer
    #[error("Invalid room number: '{value}'")]
    InvalidRoomNumber { value: String },

    /// A categorical field holds a value outside its fixed vocabulary
    #[error("Invalid value for '{field}': '{value}'")]
    InvalidCategory { field: &'static str, value: String },

    /// A required field is empty
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// Discharge precedes admission
    #[error("Discharge date {discharge} precedes admission date {admission}")]
    DischargeBeforeAdmission { admission: String, discharge: String },
}

impl MalformedInput {
    /// Name of the offending field, for grouping rejections in reports
    pub fn field(&self) -> &'static str {
        match self {
            Self::MalformedDate { field, .. } => field,
            Self::InvalidAmount { .. } => "billing_amount",
            Self::InvalidAge { .. } => "age",
            Self::InvalidRoomNumber { .. } => "room_number",
            Self::InvalidCategory { field, .. } => field,
            Self::MissingField { field } => field,
            Self::DischargeBeforeAdmission { .. } => "discharge_date",
        }
    }
}

impl From<std::io::Error> for WarehouseError {
    fn from(err: std::io::Error) -> Self {
        WarehouseError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for WarehouseError {
    fn from(err: serde_json::Error) -> Self {
        WarehouseError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for WarehouseError {
    fn from(err: toml::de::Error) -> Self {
        WarehouseError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<csv::Error> for WarehouseError {
    fn from(err: csv::Error) -> Self {
        WarehouseError::Input(format!("CSV error: {err}"))
    }
}

impl From<tokio::task::JoinError> for WarehouseError {
    fn from(err: tokio::task::JoinError) -> Self {
        WarehouseError::Pipeline(format!("Worker task failed: {err}"))
    }
}
