//! Warehouse storage abstraction
//!
//! This module defines the trait that storage backends must implement to
//! persist the dimensional model between runs.

use crate::core::dimension::{PatientDimension, ReferenceDimension};
use crate::core::fact::FactTable;
use crate::core::state::run::RunRecord;
use crate::domain::{DimensionKind, Result};
use async_trait::async_trait;

/// Persisted warehouse state
///
/// Reference dimensions are stored together with their natural-key registry,
/// so surrogate keys survive between runs. Loading a table that was never
/// written returns an empty table.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    /// Short backend label used in logs and `status`
    fn backend_name(&self) -> &str;

    /// Checks that the backend is reachable and writable
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be used.
    async fn test_connection(&self) -> Result<()>;

    /// Load one reference dimension with its key registry
    ///
    /// # Errors
    ///
    /// Returns an error if the stored table cannot be read or decoded, or if it
    /// holds a different dimension than requested.
    async fn load_reference_dimension(&self, kind: DimensionKind) -> Result<ReferenceDimension>;

    /// Replace one reference dimension
    async fn save_reference_dimension(&self, dimension: &ReferenceDimension) -> Result<()>;

    /// Load every patient history
    async fn load_patient_dimension(&self) -> Result<PatientDimension>;

    /// Replace the patient dimension
    async fn save_patient_dimension(&self, dimension: &PatientDimension) -> Result<()>;

    /// Load the fact table
    async fn load_fact_table(&self) -> Result<FactTable>;

    /// Replace the fact table
    async fn save_fact_table(&self, facts: &FactTable) -> Result<()>;

    /// Insert or replace a run record, matched by `run_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the run history cannot be written.
    async fn record_run(&self, run: &RunRecord) -> Result<()>;

    /// All run records, oldest first
    async fn list_runs(&self) -> Result<Vec<RunRecord>>;

    /// Look up one run by id
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(RunRecord))` if found, `Ok(None)` if not found.
    async fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        Ok(self
            .list_runs()
            .await?
            .into_iter()
            .find(|run| run.run_id == run_id))
    }
}
