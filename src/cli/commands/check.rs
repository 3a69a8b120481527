//! Check command implementation
//!
//! Runs the quality harness read-only against the stored tables.

use crate::cli::commands::run::exit_code_for;
use crate::config::load_config;
use crate::core::pipeline::PipelineCoordinator;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Treat failed warning checks as failures
    #[arg(long)]
    pub strict: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking stored warehouse tables");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(2);
            }
        };
        if self.strict {
            config.pipeline.fail_on_warnings = true;
        }

        // Read-only: the coordinator is only used for its harness and store
        let (_tx, rx) = watch::channel(false);
        let coordinator = match PipelineCoordinator::new(&config, rx).await {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to open warehouse: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        let report = match coordinator.check_stored().await {
            Ok(report) => report,
            Err(e) => {
                eprintln!("Quality check failed to run: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("{}", report.format_summary());
        Ok(if report.is_success() { 0 } else { 1 })
    }
}
