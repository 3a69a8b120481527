//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Meridian configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates, so a loaded configuration is a valid one.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        let workers = if config.pipeline.worker_threads == 0 {
            "one per core".to_string()
        } else {
            config.pipeline.worker_threads.to_string()
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!(
            "  Readmission Window: {} days",
            config.pipeline.readmission_window_days
        );
        println!("  Worker Threads: {workers}");
        println!(
            "  Max Length of Stay: {} days",
            config.pipeline.max_length_of_stay_days
        );
        println!("  Date Format: {}", config.pipeline.date_format);
        println!(
            "  Identity Salt: {}",
            if config.privacy.identity_salt.is_some() {
                "set"
            } else {
                "not set"
            }
        );
        println!(
            "  Storage: {} at {}",
            config.storage.backend, config.storage.path
        );
        if let Some(input) = &config.input.path {
            println!("  Default Input: {input}");
        }
        println!();
        Ok(0)
    }
}
