//! JSON file warehouse store
//!
//! One pretty-printed document per table under the configured directory:
//! `dim_<kind>.json`, `dim_patient.json`, `fact_encounter.json` and
//! `runs.json`. Every write goes to a sibling temp file first and is renamed
//! into place, so a reader never sees a half-written table.

use crate::adapters::storage::traits::WarehouseStore;
use crate::core::dimension::patient::PATIENT_TABLE;
use crate::core::dimension::{PatientDimension, ReferenceDimension};
use crate::core::fact::{FactTable, FACT_TABLE};
use crate::core::state::run::RunRecord;
use crate::domain::{DimensionKind, Result, WarehouseError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const RUNS_FILE: &str = "runs";

/// Directory-backed store
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    /// Serializes read-modify-write of the run history
    runs_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Creates a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            runs_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{table}.json"))
    }

    async fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<Option<T>> {
        let path = self.table_path(table);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(table = %table, "Table not yet written");
                return Ok(None);
            }
            Err(e) => {
                return Err(WarehouseError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            WarehouseError::Storage(format!("Corrupt table {}: {}", path.display(), e))
        })
    }

    async fn write_table<T: Serialize + ?Sized>(&self, table: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            WarehouseError::Storage(format!(
                "Failed to create storage directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let path = self.table_path(table);
        let tmp_path = self.root.join(format!(".{table}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;

        tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| {
            WarehouseError::Storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        tokio::fs::rename(&tmp_path, &path).await.map_err(|e| {
            WarehouseError::Storage(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        tracing::debug!(table = %table, bytes = bytes.len(), "Table written");
        Ok(())
    }
}

#[async_trait]
impl WarehouseStore for JsonFileStore {
    fn backend_name(&self) -> &str {
        "json"
    }

    async fn test_connection(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            WarehouseError::Storage(format!(
                "Storage directory {} is not usable: {}",
                self.root.display(),
                e
            ))
        })?;
        let marker = self.root.join(".meridian-write-check");
        tokio::fs::write(&marker, b"ok").await.map_err(|e| {
            WarehouseError::Storage(format!(
                "Storage directory {} is not writable: {}",
                self.root.display(),
                e
            ))
        })?;
        tokio::fs::remove_file(&marker).await?;
        Ok(())
    }

    async fn load_reference_dimension(&self, kind: DimensionKind) -> Result<ReferenceDimension> {
        let table = kind.table_name();
        match self.read_table::<ReferenceDimension>(&table).await? {
            Some(dimension) if dimension.kind() != kind => Err(WarehouseError::Storage(format!(
                "Table {table} holds the {} dimension",
                dimension.kind()
            ))),
            Some(dimension) => Ok(dimension),
            None => Ok(ReferenceDimension::empty(kind)),
        }
    }

    async fn save_reference_dimension(&self, dimension: &ReferenceDimension) -> Result<()> {
        self.write_table(&dimension.kind().table_name(), dimension)
            .await
    }

    async fn load_patient_dimension(&self) -> Result<PatientDimension> {
        Ok(self
            .read_table(PATIENT_TABLE)
            .await?
            .unwrap_or_default())
    }

    async fn save_patient_dimension(&self, dimension: &PatientDimension) -> Result<()> {
        self.write_table(PATIENT_TABLE, dimension).await
    }

    async fn load_fact_table(&self) -> Result<FactTable> {
        Ok(self.read_table(FACT_TABLE).await?.unwrap_or_default())
    }

    async fn save_fact_table(&self, facts: &FactTable) -> Result<()> {
        self.write_table(FACT_TABLE, facts).await
    }

    async fn record_run(&self, run: &RunRecord) -> Result<()> {
        let _guard = self.runs_lock.lock().await;
        let mut runs: Vec<RunRecord> = self.read_table(RUNS_FILE).await?.unwrap_or_default();
        match runs.iter_mut().find(|existing| existing.run_id == run.run_id) {
            Some(existing) => *existing = run.clone(),
            None => runs.push(run.clone()),
        }
        self.write_table(RUNS_FILE, &runs).await
    }

    async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        let _guard = self.runs_lock.lock().await;
        Ok(self.read_table(RUNS_FILE).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::run::RunRecordBuilder;
    use crate::domain::BatchId;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_tables_load_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("warehouse"));

        assert!(store.load_fact_table().await.unwrap().is_empty());
        assert!(store
            .load_reference_dimension(DimensionKind::Diagnosis)
            .await
            .unwrap()
            .is_empty());
        assert!(store.list_runs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .save_reference_dimension(&ReferenceDimension::empty(DimensionKind::Insurance))
            .await
            .unwrap();

        assert!(dir.path().join("dim_insurance.json").exists());
        assert!(!dir.path().join(".dim_insurance.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_mismatched_dimension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path());
        let medication = ReferenceDimension::empty(DimensionKind::Medication);
        std::fs::write(
            dir.path().join("dim_provider.json"),
            serde_json::to_vec(&medication).unwrap(),
        )
        .unwrap();

        let err = store
            .load_reference_dimension(DimensionKind::Provider)
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::Storage(_)));
    }

    #[tokio::test]
    async fn test_corrupt_table_is_storage_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fact_encounter.json"), b"{not json").unwrap();
        let store = JsonFileStore::new(dir.path());

        let err = store.load_fact_table().await.unwrap_err();
        assert!(err.to_string().contains("Corrupt table"));
    }

    #[tokio::test]
    async fn test_runs_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let run = RunRecordBuilder::new(
            BatchId::new("2024-02").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        )
        .records_received(3)
        .build();

        JsonFileStore::new(dir.path()).record_run(&run).await.unwrap();

        let reopened = JsonFileStore::new(dir.path());
        let loaded = reopened.load_run(&run.run_id).await.unwrap().unwrap();
        assert_eq!(loaded, run);
        reopened.test_connection().await.unwrap();
    }
}
