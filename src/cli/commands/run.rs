//! Run command implementation
//!
//! This module implements the `run` command, which loads one batch of raw
//! encounters and merges it into the warehouse.

use crate::adapters::source::read_csv_file;
use crate::config::load_config;
use crate::core::pipeline::PipelineCoordinator;
use crate::domain::{BatchId, WarehouseError};
use chrono::{NaiveDate, Utc};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Identifier of the input batch
    #[arg(long)]
    pub batch_id: String,

    /// Effective date for patient versioning (YYYY-MM-DD, default today)
    #[arg(long, value_parser = parse_as_of)]
    pub as_of: Option<NaiveDate>,

    /// CSV file to load (defaults to input.path from the configuration)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Dry run mode - run every stage without persisting tables
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_as_of(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{value}': {e}"))
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        let batch_id = match BatchId::new(self.batch_id.clone()) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Invalid batch id: {e}");
                return Ok(2);
            }
        };
        let as_of = self.as_of.unwrap_or_else(|| Utc::now().date_naive());

        let Some(input) = self.input.clone().or_else(|| config.input.path.clone()) else {
            eprintln!("No input file: pass --input or set input.path in the configuration");
            return Ok(2);
        };

        if config.application.dry_run {
            println!("🔍 DRY RUN MODE - No tables will be written");
            println!();
        }

        let records = match tokio::task::spawn_blocking(move || read_csv_file(&input)).await? {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read input");
                eprintln!("Failed to read input: {e}");
                return Ok(5);
            }
        };

        let interrupted = shutdown_signal.clone();
        let coordinator = match PipelineCoordinator::new(&config, shutdown_signal).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create pipeline coordinator");
                eprintln!("Failed to initialize run: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("🚀 Starting run {batch_id} as of {as_of}...");
        println!();

        let report = match coordinator.execute_run(batch_id, as_of, records).await {
            Ok(report) => report,
            Err(_) if *interrupted.borrow() => {
                println!();
                println!("⚠️  Run interrupted before persistence. Nothing was written.");
                println!("   Run the same command again to load the batch.");
                return Ok(130); // SIGINT exit code (standard Unix convention)
            }
            Err(e) => {
                eprintln!("Run failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("{}", report.format_summary());

        match report.invariant_violation() {
            None => {
                println!("✅ Run completed successfully!");
                Ok(0)
            }
            Some(violation) => {
                eprintln!("{violation}");
                println!("❌ Run finished with failing quality checks; loaded rows were kept");
                Ok(1)
            }
        }
    }
}

/// Exit code for a batch-level error
pub fn exit_code_for(error: &WarehouseError) -> i32 {
    match error {
        WarehouseError::Configuration(_) => 2,
        WarehouseError::Storage(_) | WarehouseError::Io(_) => 4,
        _ => 5,
    }
}
