//! Run history records
//!
//! Each pipeline run leaves a [`RunRecord`] in the store. A record is written
//! as `InProgress` before any table changes and updated when the run ends, so
//! an interrupted run is visible as a record that never left `InProgress`.

use crate::domain::BatchId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Run status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress, or was interrupted
    #[default]
    InProgress,
    /// All stages finished and no fatal quality check failed
    Succeeded,
    /// A stage aborted, or fatal quality checks failed
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One pipeline run
///
/// # Examples
///
/// ```
/// use meridian::core::state::run::{RunRecordBuilder, RunStatus};
/// use meridian::domain::BatchId;
/// use chrono::NaiveDate;
///
/// let record = RunRecordBuilder::new(
///     BatchId::new("2024-06").unwrap(),
///     NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
/// )
/// .records_received(250)
/// .build();
///
/// assert_eq!(record.records_received, 250);
/// assert_eq!(record.status, RunStatus::InProgress);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run identifier: "{batch_id}@{started_at}"
    pub run_id: String,
    pub batch_id: BatchId,
    /// Effective date used for patient versioning
    pub as_of: NaiveDate,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_received: usize,
    /// Fact rows inserted plus updated
    pub fact_rows_changed: usize,
    /// Names of failing quality checks, or the abort reason
    pub failure_reasons: Vec<String>,
    pub dry_run: bool,
}

impl RunRecord {
    pub fn generate_id(batch_id: &BatchId, started_at: DateTime<Utc>) -> String {
        format!("{}@{}", batch_id, started_at.format("%Y%m%dT%H%M%S%.3fZ"))
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == RunStatus::InProgress
    }

    /// Duration of the run if it finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|completed| completed - self.started_at)
    }

    pub fn mark_succeeded(&mut self, fact_rows_changed: usize) {
        self.completed_at = Some(Utc::now());
        self.status = RunStatus::Succeeded;
        self.fact_rows_changed = fact_rows_changed;
    }

    pub fn mark_failed(&mut self, fact_rows_changed: usize, reasons: Vec<String>) {
        self.completed_at = Some(Utc::now());
        self.status = RunStatus::Failed;
        self.fact_rows_changed = fact_rows_changed;
        self.failure_reasons = reasons;
    }
}

/// Builder for creating RunRecord instances
pub struct RunRecordBuilder {
    batch_id: BatchId,
    as_of: NaiveDate,
    started_at: Option<DateTime<Utc>>,
    records_received: usize,
    dry_run: bool,
}

impl RunRecordBuilder {
    pub fn new(batch_id: BatchId, as_of: NaiveDate) -> Self {
        Self {
            batch_id,
            as_of,
            started_at: None,
            records_received: 0,
            dry_run: false,
        }
    }

    pub fn started_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.started_at = Some(timestamp);
        self
    }

    pub fn records_received(mut self, count: usize) -> Self {
        self.records_received = count;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build the RunRecord
    pub fn build(self) -> RunRecord {
        let started_at = self.started_at.unwrap_or_else(Utc::now);
        RunRecord {
            run_id: RunRecord::generate_id(&self.batch_id, started_at),
            batch_id: self.batch_id,
            as_of: self.as_of,
            status: RunStatus::InProgress,
            started_at,
            completed_at: None,
            records_received: self.records_received,
            fact_rows_changed: 0,
            failure_reasons: Vec::new(),
            dry_run: self.dry_run,
        }
    }
}
