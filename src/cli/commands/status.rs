//! Status command implementation
//!
//! This module implements the `status` command for displaying run history
//! and table sizes.

use crate::adapters::storage::create_store;
use crate::cli::commands::run::exit_code_for;
use crate::config::load_config;
use crate::core::state::{RunStatus, StateManager};
use crate::domain::DimensionKind;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of most recent runs to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Only show runs of this batch
    #[arg(long)]
    pub batch_id: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking warehouse status");

        println!("📊 Warehouse Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let store = match create_store(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to open storage");
                println!("   Error: {e}");
                return Ok(4);
            }
        };
        let state_manager = StateManager::new_with_storage(store);

        let (snapshot, runs) = match tokio::try_join!(
            state_manager.load_snapshot(),
            state_manager.list_runs()
        ) {
            Ok(loaded) => loaded,
            Err(e) => {
                println!("❌ Failed to read warehouse state");
                println!("   Error: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        println!("Tables ({} at {}):", config.storage.backend, config.storage.path);
        println!("  {:<20} {:>10}", "fact_encounter", snapshot.facts().len());
        println!(
            "  {:<20} {:>10} ({} current)",
            "dim_patient",
            snapshot.patients().len(),
            snapshot.current_patients().count()
        );
        for kind in DimensionKind::ALL {
            println!(
                "  {:<20} {:>10}",
                kind.table_name(),
                snapshot.dimension(kind).len()
            );
        }
        println!();

        let mut runs: Vec<_> = runs
            .into_iter()
            .filter(|run| {
                self.batch_id
                    .as_deref()
                    .map_or(true, |batch| run.batch_id.as_str() == batch)
            })
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        if runs.is_empty() {
            println!("No run history found.");
            println!("Run 'meridian run --batch-id <ID> --input <CSV>' to load data.");
            return Ok(0);
        }

        println!(
            "{:<40} {:<12} {:<16} {:>10} {:>10} {:<20}",
            "Run ID", "As of", "Status", "Received", "Changed", "Started"
        );
        println!("{}", "-".repeat(112));

        for run in runs.iter().take(self.limit) {
            let status = match run.status {
                RunStatus::Succeeded => "✅ Succeeded",
                RunStatus::Failed => "❌ Failed",
                RunStatus::InProgress => "🔄 In Progress",
            };
            let status = if run.dry_run {
                format!("{status} (dry)")
            } else {
                status.to_string()
            };
            println!(
                "{:<40} {:<12} {:<16} {:>10} {:>10} {:<20}",
                run.run_id,
                run.as_of,
                status,
                run.records_received,
                run.fact_rows_changed,
                run.started_at.format("%Y-%m-%d %H:%M:%S")
            );
            for reason in &run.failure_reasons {
                println!("    - {reason}");
            }
        }

        println!();
        Ok(0)
    }
}
