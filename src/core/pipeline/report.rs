//! Run report
//!
//! This module defines the structure returned by every pipeline run.

use crate::core::dimension::DimensionBuildStats;
use crate::core::fact::MergeOutcome;
use crate::core::pipeline::ingest::{DuplicateKeyCollision, Rejection};
use crate::core::quality::QualityReport;
use crate::core::state::run::RunStatus;
use crate::domain::{BatchId, WarehouseError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub batch_id: BatchId,
    pub as_of: NaiveDate,
    pub status: RunStatus,
    pub dry_run: bool,

    /// Number of raw records handed to the run
    pub records_received: usize,

    /// Records that normalized and keyed cleanly, duplicates included
    pub records_cleaned: usize,

    /// Records refused by the normalizer
    pub rejections: Vec<Rejection>,

    /// Exact in-batch repeats
    pub duplicates_skipped: usize,

    /// Key collisions held back for review
    pub collisions: Vec<DuplicateKeyCollision>,

    /// Encounters flagged as readmissions
    pub readmissions_flagged: usize,

    /// Per-table dimension counts, patient dimension last
    pub dimensions: Vec<DimensionBuildStats>,

    /// Fact merge counts and quarantined encounters
    pub facts: MergeOutcome,

    /// Quality harness results
    pub quality: Option<QualityReport>,

    pub duration: Duration,
}

impl RunReport {
    /// Create an empty report for a run
    pub fn new(run_id: String, batch_id: BatchId, as_of: NaiveDate, dry_run: bool) -> Self {
        Self {
            run_id,
            batch_id,
            as_of,
            status: RunStatus::InProgress,
            dry_run,
            records_received: 0,
            records_cleaned: 0,
            rejections: Vec::new(),
            duplicates_skipped: 0,
            collisions: Vec::new(),
            readmissions_flagged: 0,
            dimensions: Vec::new(),
            facts: MergeOutcome::default(),
            quality: None,
            duration: Duration::from_secs(0),
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn is_successful(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn rows_rejected(&self) -> usize {
        self.rejections.len()
    }

    /// Fact rows inserted plus updated
    pub fn fact_rows_changed(&self) -> usize {
        self.facts.net_changes()
    }

    pub fn dimension_rows_created(&self) -> usize {
        self.dimensions.iter().map(|stats| stats.created).sum()
    }

    pub fn dimension_rows_updated(&self) -> usize {
        self.dimensions.iter().map(DimensionBuildStats::updated).sum()
    }

    /// Names of fatal (or promoted) quality checks that failed
    pub fn failing_checks(&self) -> Vec<String> {
        self.quality
            .as_ref()
            .map(QualityReport::failing_checks)
            .unwrap_or_default()
    }

    /// The failing fatal checks as an error, if any
    ///
    /// The run itself is not an `Err` in that case; callers that need a
    /// `Result` (for example an exit code) convert through this.
    pub fn invariant_violation(&self) -> Option<WarehouseError> {
        let checks = self.failing_checks();
        if checks.is_empty() {
            None
        } else {
            Some(WarehouseError::InvariantViolation { checks })
        }
    }

    /// Rejection counts grouped by offending field
    pub fn rejections_by_field(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for rejection in &self.rejections {
            *counts.entry(rejection.field()).or_insert(0) += 1;
        }
        counts
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            status = %self.status,
            received = self.records_received,
            cleaned = self.records_cleaned,
            rejected = self.rows_rejected(),
            duplicates_skipped = self.duplicates_skipped,
            readmissions = self.readmissions_flagged,
            facts_inserted = self.facts.inserted,
            facts_updated = self.facts.updated,
            facts_unchanged = self.facts.unchanged,
            quarantined = self.facts.quarantined_encounters(),
            duration_ms = self.duration.as_millis() as u64,
            "Run completed"
        );

        for (field, count) in self.rejections_by_field() {
            tracing::warn!(field = field, count = count, "Records rejected");
        }
        for collision in &self.collisions {
            tracing::warn!(
                encounter_key = collision.encounter_key.short(),
                kept_row = collision.kept_row,
                held_back_row = collision.held_back_row,
                "Key collision needs manual review"
            );
        }
        let failing = self.failing_checks();
        if !failing.is_empty() {
            tracing::error!(checks = ?failing, "Fatal quality checks failed");
        }
    }

    /// Format the report as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut out = String::new();
        let marker = if self.is_successful() { "✅" } else { "❌" };
        out.push_str(&format!("{marker} Run {} ({})\n", self.run_id, self.status));
        if self.dry_run {
            out.push_str("  DRY RUN: nothing was persisted\n");
        }
        out.push_str(&format!("  As of: {}\n", self.as_of));
        out.push_str(&format!("  Duration: {:.2}s\n", self.duration.as_secs_f64()));
        out.push_str(&format!(
            "  Records: {} received, {} cleaned, {} rejected, {} duplicate(s) skipped\n",
            self.records_received,
            self.records_cleaned,
            self.rows_rejected(),
            self.duplicates_skipped
        ));
        out.push_str(&format!("  Readmissions flagged: {}\n", self.readmissions_flagged));
        out.push_str(&format!(
            "  Dimension rows: {} created, {} updated\n",
            self.dimension_rows_created(),
            self.dimension_rows_updated()
        ));
        out.push_str(&format!(
            "  Fact rows: {} inserted, {} updated, {} unchanged, {} quarantined\n",
            self.facts.inserted,
            self.facts.updated,
            self.facts.unchanged,
            self.facts.quarantined_encounters()
        ));

        if !self.rejections.is_empty() {
            out.push_str("\n  Rejections by field:\n");
            for (field, count) in self.rejections_by_field() {
                out.push_str(&format!("    {field}: {count}\n"));
            }
        }
        if !self.collisions.is_empty() {
            out.push_str(&format!(
                "\n⚠️  {} key collision(s) held back for review\n",
                self.collisions.len()
            ));
        }
        if let Some(quality) = &self.quality {
            out.push('\n');
            out.push_str(&quality.format_summary());
        }
        out
    }
}
