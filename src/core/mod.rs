//! Core business logic for Meridian.
//!
//! This module contains the pipeline stages and their orchestration.
//!
//! # Modules
//!
//! - [`normalize`] - Cleans and casts one raw record at a time
//! - [`keys`] - Deterministic encounter keys and identity hashes
//! - [`temporal`] - Per-patient ordering and readmission features
//! - [`dimension`] - Reference dimensions and the type-2 patient dimension
//! - [`fact`] - Idempotent fact table merge
//! - [`quality`] - Declarative checks over the loaded tables
//! - [`pipeline`] - Run orchestration and reporting
//! - [`state`] - Persistence and run history
//!
//! # Run Workflow
//!
//! 1. **Ingest**: Normalize and key records, drop in-batch duplicates
//! 2. **Analyze**: Partition by patient and derive readmission features
//! 3. **Build**: Assign surrogate keys and version patients as of the run date
//! 4. **Merge**: Resolve every foreign key and merge the fact table
//! 5. **Refresh**: Recompute dimension aggregates over all facts
//! 6. **Persist**: Write every table
//! 7. **Check**: Run the quality harness and record the outcome
//!
//! # Example
//!
//! ```rust,no_run
//! use meridian::config::load_config;
//! use meridian::core::pipeline::PipelineCoordinator;
//! use meridian::domain::BatchId;
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("meridian.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let coordinator = PipelineCoordinator::new(&config, shutdown_rx).await?;
//!
//! let records = meridian::adapters::source::read_csv_file("encounters.csv")?;
//! let report = coordinator
//!     .execute_run(
//!         BatchId::new("2024-06")?,
//!         NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
//!         records,
//!     )
//!     .await?;
//!
//! println!("Inserted: {}", report.facts.inserted);
//! println!("Rejected: {}", report.rows_rejected());
//! # Ok(())
//! # }
//! ```

pub mod dimension;
pub mod fact;
pub mod keys;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod state;
pub mod temporal;
pub mod warehouse;

#[cfg(test)]
pub(crate) mod testing;
