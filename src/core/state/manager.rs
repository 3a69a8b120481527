//! State manager for warehouse persistence
//!
//! This module provides the StateManager for loading and saving the warehouse
//! tables and the run history through a storage backend.

use crate::adapters::storage::{self, WarehouseStore};
use crate::core::state::run::RunRecord;
use crate::core::warehouse::{Warehouse, WarehouseSnapshot};
use crate::domain::Result;
use std::sync::Arc;

/// State manager for warehouse persistence
///
/// Owns the handle to the store so pipeline stages never see it directly.
pub struct StateManager {
    storage: Arc<dyn WarehouseStore + Send + Sync>,
}

impl StateManager {
    /// Create a new StateManager with a storage backend
    pub fn new_with_storage(storage: Arc<dyn WarehouseStore + Send + Sync>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn WarehouseStore + Send + Sync> {
        &self.storage
    }

    /// Load every persisted table
    ///
    /// # Errors
    ///
    /// Returns an error if any table cannot be read or decoded.
    pub async fn load_warehouse(&self) -> Result<Warehouse> {
        let warehouse = storage::load_warehouse(self.storage.as_ref()).await?;
        tracing::debug!(
            backend = self.storage.backend_name(),
            facts = warehouse.facts.len(),
            patients = warehouse.patients.patient_count(),
            "Loaded warehouse state"
        );
        Ok(warehouse)
    }

    /// Read-only snapshot of the persisted tables
    pub async fn load_snapshot(&self) -> Result<WarehouseSnapshot> {
        storage::load_snapshot(self.storage.as_ref()).await
    }

    /// Persist every table
    ///
    /// Reference dimensions go first and the fact table last, so an
    /// interrupted save never leaves facts pointing at unsaved keys.
    ///
    /// # Arguments
    ///
    /// * `warehouse` - Tables to write
    /// * `dry_run` - If true, skip actual writes
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails.
    pub async fn save_warehouse(&self, warehouse: &Warehouse, dry_run: bool) -> Result<()> {
        if dry_run {
            tracing::info!(
                facts = warehouse.facts.len(),
                patients = warehouse.patients.patient_count(),
                "DRY RUN: Would persist warehouse tables"
            );
            return Ok(());
        }

        for dimension in warehouse.reference.iter() {
            self.storage.save_reference_dimension(dimension).await?;
        }
        self.storage
            .save_patient_dimension(&warehouse.patients)
            .await?;
        self.storage.save_fact_table(&warehouse.facts).await?;

        tracing::info!(
            backend = self.storage.backend_name(),
            facts = warehouse.facts.len(),
            "Warehouse tables persisted"
        );
        Ok(())
    }

    /// Insert or update a run record
    ///
    /// Run history is written in dry-run mode too, flagged with `dry_run`.
    pub async fn record_run(&self, run: &RunRecord) -> Result<()> {
        tracing::debug!(run_id = %run.run_id, status = %run.status, "Recording run");
        self.storage.record_run(run).await
    }

    pub async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        self.storage.list_runs().await
    }

    /// Most recently started run, if any
    pub async fn last_run(&self) -> Result<Option<RunRecord>> {
        Ok(self
            .storage
            .list_runs()
            .await?
            .into_iter()
            .max_by_key(|run| run.started_at))
    }
}
