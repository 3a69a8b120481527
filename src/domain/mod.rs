//! Domain models and types for Meridian.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`EncounterKey`], [`PatientIdentityHash`], [`SurrogateKey`], [`BatchId`])
//! - **Stage models** ([`RawRecord`] -> [`CleanedEncounter`] -> [`EnrichedEncounter`] -> [`FactEncounterRow`])
//! - **Dimension models** ([`ReferenceDimensionRow`], [`PatientHistory`])
//! - **Error types** ([`WarehouseError`], [`MalformedInput`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers use the newtype pattern so hashes and keys cannot be mixed:
//!
//! ```rust
//! use meridian::domain::{EncounterKey, PatientIdentityHash};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let encounter_key = EncounterKey::new("0".repeat(64))?;
//! let identity = PatientIdentityHash::new("1".repeat(64))?;
//!
//! // This won't compile - the types are distinct
//! // let wrong: EncounterKey = identity;
//! # Ok(())
//! # }
//! ```

pub mod dimension;
pub mod encounter;
pub mod errors;
pub mod fact;
pub mod ids;
pub mod patient;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use dimension::{DimensionAttributes, DimensionKind, ReferenceDimensionRow};
pub use encounter::{AdmissionType, AgeGroup, CleanedEncounter, EnrichedEncounter, Season};
pub use errors::{MalformedInput, WarehouseError};
pub use fact::FactEncounterRow;
pub use ids::{BatchId, EncounterKey, PatientIdentityHash, SurrogateKey};
pub use patient::{
    PatientDimensionRow, PatientHistory, PatientLifetime, PatientSnapshot, PatientVersion,
    VersionState,
};
pub use record::{RawRecord, RawRecordBuilder};
pub use result::Result;
