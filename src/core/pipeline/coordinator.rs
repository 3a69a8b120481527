//! Pipeline coordinator - main orchestrator for a warehouse run
//!
//! This module drives one batch through every stage: ingest, temporal
//! analysis, dimension build, fact merge, aggregate refresh, persistence and
//! the quality harness, recording the run in the store as it goes. The stored
//! tables are read once, up front, so temporal analysis can see admissions
//! loaded by earlier batches.

use crate::adapters::storage::create_store;
use crate::config::MeridianConfig;
use crate::core::dimension::{self, aggregates, BuiltDimensions, DimensionBuildStats};
use crate::core::fact::{FactLoader, MergeOutcome};
use crate::core::keys::KeyEngine;
use crate::core::normalize::Normalizer;
use crate::core::pipeline::ingest::{self, IngestOutcome};
use crate::core::pipeline::report::RunReport;
use crate::core::quality::{QualityHarness, QualityReport};
use crate::core::state::run::RunRecordBuilder;
use crate::core::state::StateManager;
use crate::core::temporal::{AdmissionHistory, TemporalAnalyzer};
use crate::core::warehouse::Warehouse;
use crate::domain::{BatchId, EnrichedEncounter, RawRecord, Result, WarehouseError};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Stateless stage configuration shared with the worker pool
struct Stages {
    normalizer: Normalizer,
    keys: KeyEngine,
    temporal: TemporalAnalyzer,
    harness: QualityHarness,
}

/// Pipeline coordinator
pub struct PipelineCoordinator {
    stages: Arc<Stages>,
    pool: Arc<rayon::ThreadPool>,
    state_manager: Arc<StateManager>,
    dry_run: bool,
    shutdown_signal: watch::Receiver<bool>,
}

impl PipelineCoordinator {
    /// Create a coordinator backed by the configured store
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unusable or the worker pool cannot be
    /// built.
    pub async fn new(config: &MeridianConfig, shutdown_signal: watch::Receiver<bool>) -> Result<Self> {
        let store = create_store(config).await?;
        let state_manager = Arc::new(StateManager::new_with_storage(store));
        Self::with_state_manager(config, state_manager, shutdown_signal)
    }

    /// Create a coordinator over an existing state manager
    pub fn with_state_manager(
        config: &MeridianConfig,
        state_manager: Arc<StateManager>,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Result<Self> {
        let pipeline = &config.pipeline;

        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("meridian-worker-{index}"));
        if pipeline.worker_threads > 0 {
            builder = builder.num_threads(pipeline.worker_threads);
        }
        let pool = builder
            .build()
            .map_err(|e| WarehouseError::Pipeline(format!("Failed to build worker pool: {e}")))?;

        let stages = Stages {
            normalizer: Normalizer::new(pipeline.date_format.clone()),
            keys: KeyEngine::new(config.privacy.identity_salt.clone()),
            temporal: TemporalAnalyzer::new(i64::from(pipeline.readmission_window_days)),
            harness: QualityHarness::with_default_checks(
                pipeline.max_length_of_stay_days,
                pipeline.quality_sample_size,
                pipeline.fail_on_warnings,
            ),
        };

        tracing::debug!(
            workers = pool.current_num_threads(),
            window_days = pipeline.readmission_window_days,
            salted = config.privacy.identity_salt.is_some(),
            "Pipeline coordinator ready"
        );

        Ok(Self {
            stages: Arc::new(stages),
            pool: Arc::new(pool),
            state_manager,
            dry_run: config.application.dry_run,
            shutdown_signal,
        })
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    /// Execute one run
    ///
    /// This is the single entry point for a batch. It:
    /// 1. Records the run as in progress and loads the stored tables
    /// 2. Normalizes and keys every record on the worker pool
    /// 3. Drops in-batch duplicates and holds back key collisions
    /// 4. Derives readmission features per patient, counting stored admissions
    /// 5. Builds every dimension against the persisted state
    /// 6. Merges the fact table
    /// 7. Refreshes dimension aggregates
    /// 8. Persists every table (skipped in dry-run mode)
    /// 9. Runs the quality harness over the tables read back from the store,
    ///    or over the in-memory result in dry-run mode
    /// 10. Records the final run status
    ///
    /// Record-level problems end up in the report. A fatal quality failure
    /// gives a `Failed` report, not an error, and the loaded rows stay.
    ///
    /// # Errors
    ///
    /// Returns an error for batch-level failures (storage, an as-of date that
    /// would close a patient version before it opened, shutdown before
    /// persistence). The run record is marked failed first.
    pub async fn execute_run(
        &self,
        batch_id: BatchId,
        as_of: NaiveDate,
        records: Vec<RawRecord>,
    ) -> Result<RunReport> {
        let start_time = Instant::now();

        let mut run = RunRecordBuilder::new(batch_id.clone(), as_of)
            .records_received(records.len())
            .dry_run(self.dry_run)
            .build();
        self.state_manager.record_run(&run).await?;

        tracing::info!(
            run_id = %run.run_id,
            records = records.len(),
            as_of = %as_of,
            dry_run = self.dry_run,
            "Starting pipeline run"
        );

        let mut report = RunReport::new(run.run_id.clone(), batch_id, as_of, self.dry_run);
        report.records_received = records.len();

        match self.run_stages(as_of, records, &mut report).await {
            Ok(quality) => {
                let failing = quality.failing_checks();
                if failing.is_empty() {
                    run.mark_succeeded(report.fact_rows_changed());
                } else {
                    run.mark_failed(report.fact_rows_changed(), failing);
                }
                report.quality = Some(quality);
                report.status = run.status;
                self.state_manager.record_run(&run).await?;
            }
            Err(e) => {
                crate::log_error_with_context!(&e, "Pipeline run aborted");
                run.mark_failed(0, vec![e.to_string()]);
                if let Err(record_err) = self.state_manager.record_run(&run).await {
                    tracing::error!(error = %record_err, "Failed to record aborted run");
                }
                return Err(e);
            }
        }

        let report = report.with_duration(start_time.elapsed());
        report.log_summary();
        Ok(report)
    }

    async fn run_stages(
        &self,
        as_of: NaiveDate,
        records: Vec<RawRecord>,
        report: &mut RunReport,
    ) -> Result<QualityReport> {
        let loaded = self.state_manager.load_warehouse().await?;
        let history = loaded.admission_history();

        // Stages 2-4: per-batch work, with stored admissions as context
        let stage_start = Instant::now();
        let stages = Arc::clone(&self.stages);
        let pool = Arc::clone(&self.pool);
        let (ingested, enriched, history) = tokio::task::spawn_blocking(move || {
            pool.install(
                || -> Result<(IngestOutcome, Vec<EnrichedEncounter>, AdmissionHistory)> {
                    let mut ingested = ingest::ingest(&records, &stages.normalizer, &stages.keys)?;
                    let encounters = std::mem::take(&mut ingested.encounters);
                    let enriched = stages.temporal.analyze_with_history(encounters, &history);
                    Ok((ingested, enriched, history))
                },
            )
        })
        .await??;

        report.records_cleaned =
            enriched.len() + ingested.duplicates_skipped + ingested.collisions.len();
        report.rejections = ingested.rejections;
        report.duplicates_skipped = ingested.duplicates_skipped;
        report.collisions = ingested.collisions;
        report.readmissions_flagged = enriched.iter().filter(|e| e.is_readmission).count();
        crate::log_stage_complete!("ingest", enriched.len(), stage_start.elapsed());
        self.check_shutdown()?;

        // Stages 5-7: merge against the persisted tables
        let stage_start = Instant::now();
        let pool = Arc::clone(&self.pool);
        let (warehouse, merged) = tokio::task::spawn_blocking(move || {
            pool.install(|| merge_batch(loaded, &enriched, &history, as_of))
        })
        .await??;

        report.dimensions = merged.dimensions;
        report.facts = merged.facts;
        crate::log_stage_complete!("merge", warehouse.facts.len(), stage_start.elapsed());
        self.check_shutdown()?;

        // Stage 8
        self.state_manager
            .save_warehouse(&warehouse, self.dry_run)
            .await?;

        // Stage 9: read-only; a real run checks what the store now holds
        let snapshot = if self.dry_run {
            warehouse.snapshot()
        } else {
            self.state_manager.load_snapshot().await?
        };
        let stages = Arc::clone(&self.stages);
        let pool = Arc::clone(&self.pool);
        let quality =
            tokio::task::spawn_blocking(move || pool.install(|| stages.harness.run(&snapshot)))
                .await??;

        Ok(quality)
    }

    fn check_shutdown(&self) -> Result<()> {
        if *self.shutdown_signal.borrow() {
            tracing::warn!("Shutdown requested; stopping before persistence");
            return Err(WarehouseError::Pipeline(
                "Run interrupted by shutdown signal".to_string(),
            ));
        }
        Ok(())
    }

    /// Run the quality harness against the stored tables without changing them
    pub async fn check_stored(&self) -> Result<QualityReport> {
        let snapshot = self.state_manager.load_snapshot().await?;
        let stages = Arc::clone(&self.stages);
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || pool.install(|| stages.harness.run(&snapshot))).await?
    }
}

/// Counts produced by the merge stages
struct MergeCounts {
    dimensions: Vec<DimensionBuildStats>,
    facts: MergeOutcome,
}

/// Dimension build, fact merge and aggregate refresh
///
/// Runs on the worker pool. The fact merge starts only after every dimension
/// build has returned.
fn merge_batch(
    loaded: Warehouse,
    enriched: &[EnrichedEncounter],
    on_file: &AdmissionHistory,
    as_of: NaiveDate,
) -> Result<(Warehouse, MergeCounts)> {
    let BuiltDimensions {
        mut reference,
        mut patients,
        stats: mut dimension_stats,
    } = dimension::build_all(loaded.reference, loaded.patients, enriched, on_file, as_of)?;

    let (facts, outcome) = FactLoader::new().merge(loaded.facts, enriched, &reference, &patients);

    let refreshed = aggregates::refresh_all(&mut reference, &mut patients, &facts);
    for stats in &mut dimension_stats {
        if let Some(changed) = refreshed.get(&stats.table) {
            stats.refreshed = *changed;
        }
    }

    Ok((
        Warehouse {
            reference,
            patients,
            facts,
        },
        MergeCounts {
            dimensions: dimension_stats,
            facts: outcome,
        },
    ))
}
