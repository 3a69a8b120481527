//! Process-local warehouse store

use crate::adapters::storage::traits::WarehouseStore;
use crate::core::dimension::{PatientDimension, ReferenceDimension};
use crate::core::fact::FactTable;
use crate::core::state::run::RunRecord;
use crate::domain::{DimensionKind, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Tables held in memory for the lifetime of the process
///
/// Used by tests and by dry runs that should not touch the configured store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    reference: RwLock<BTreeMap<DimensionKind, ReferenceDimension>>,
    patients: RwLock<PatientDimension>,
    facts: RwLock<FactTable>,
    runs: RwLock<Vec<RunRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WarehouseStore for InMemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn load_reference_dimension(&self, kind: DimensionKind) -> Result<ReferenceDimension> {
        Ok(self
            .reference
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ReferenceDimension::empty(kind)))
    }

    async fn save_reference_dimension(&self, dimension: &ReferenceDimension) -> Result<()> {
        self.reference
            .write()
            .await
            .insert(dimension.kind(), dimension.clone());
        Ok(())
    }

    async fn load_patient_dimension(&self) -> Result<PatientDimension> {
        Ok(self.patients.read().await.clone())
    }

    async fn save_patient_dimension(&self, dimension: &PatientDimension) -> Result<()> {
        *self.patients.write().await = dimension.clone();
        Ok(())
    }

    async fn load_fact_table(&self) -> Result<FactTable> {
        Ok(self.facts.read().await.clone())
    }

    async fn save_fact_table(&self, facts: &FactTable) -> Result<()> {
        *self.facts.write().await = facts.clone();
        Ok(())
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        let mut runs = self.runs.write().await;
        match runs.iter_mut().find(|existing| existing.run_id == run.run_id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }
        Ok(())
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.runs.read().await.clone())
    }
}
