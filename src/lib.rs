// Meridian - Healthcare encounter warehouse pipeline
// Copyright (c) 2025 Meridian Contributors
// Licensed under the MIT License

//! # Meridian - Encounter Warehouse Pipeline
//!
//! Meridian turns flat batches of hospital encounter records into a star
//! schema: one fact row per encounter and a set of dimensions, including a
//! type-2 patient dimension that keeps every demographic version.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Normalizing** raw CSV rows into typed encounters, rejecting malformed rows
//! - **Keying** encounters and patients with salted, deterministic hashes
//! - **Deriving** length of stay, cost per day and readmission features
//! - **Loading** dimensions and facts idempotently, so a replayed batch changes nothing
//! - **Checking** the loaded tables with a declarative quality harness
//!
//! ## Architecture
//!
//! Meridian follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline stages, orchestration and run history
//! - [`adapters`] - CSV input and warehouse storage backends
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meridian::adapters::source::read_csv_file;
//! use meridian::config::load_config;
//! use meridian::core::pipeline::PipelineCoordinator;
//! use meridian::domain::BatchId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("meridian.toml")?;
//!     let (_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let coordinator = PipelineCoordinator::new(&config, shutdown_rx).await?;
//!
//!     let records = read_csv_file("encounters.csv")?;
//!     let as_of = chrono::Utc::now().date_naive();
//!     let report = coordinator
//!         .execute_run(BatchId::new("2024-06")?, as_of, records)
//!         .await?;
//!
//!     println!("{}", report.format_summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`], whose error type is
//! [`domain::WarehouseError`]. Row-level problems are not errors: they become
//! [`domain::MalformedInput`] rejections on the run report.
//!
//! ## Logging
//!
//! Meridian logs through `tracing`; see [`logging::init_logging`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
