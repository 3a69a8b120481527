//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "meridian.toml")]
    pub output: String,

    /// Include every setting with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Meridian configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Put MERIDIAN_IDENTITY_SALT in a .env file or the environment");
                println!("  3. Validate configuration: meridian validate-config");
                println!("  4. Load a batch: meridian run --batch-id <ID> --input <CSV>");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Meridian Configuration File

[privacy]
identity_salt = "${MERIDIAN_IDENTITY_SALT}"

[storage]
backend = "json"
path = "./warehouse"
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Meridian Configuration File
#
# Every value can be overridden with MERIDIAN_<SECTION>_<KEY>, for example
# MERIDIAN_STORAGE_PATH or MERIDIAN_PIPELINE_WORKER_THREADS.
# ${VAR} references are replaced from the environment (and .env) on load.

[application]
# trace, debug, info, warn, error
log_level = "info"
# Run every stage but persist nothing
dry_run = false

[pipeline]
# Largest admission-to-admission gap, in days, flagged as a readmission
readmission_window_days = 30
# Worker threads for the CPU stages (0 = one per core)
worker_threads = 0
# Upper bound of the length-of-stay quality check
max_length_of_stay_days = 365
# Violating keys kept per quality check
quality_sample_size = 10
# Fail the run on warning-level quality checks too
fail_on_warnings = false
# chrono format of the admission and discharge columns
date_format = "%Y-%m-%d"

[privacy]
# Mixed into every key. Keep it stable: changing it re-keys the warehouse.
identity_salt = "${MERIDIAN_IDENTITY_SALT}"

[storage]
# json or memory
backend = "json"
path = "./warehouse"

[input]
# CSV read when `run` is given no --input
# path = "./data/encounters.csv"

[logging]
local_enabled = false
local_path = "./logs"
# daily, hourly, never
local_rotation = "daily"
"#
        .to_string()
    }
}
