//! Configuration management for Meridian.
//!
//! This module provides TOML-based configuration loading, parsing, and
//! validation.
//!
//! # Overview
//!
//! Meridian uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MERIDIAN_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use meridian::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("meridian.toml")?;
//!
//! println!("Storage: {} at {}", config.storage.backend, config.storage.path);
//! println!("Readmission window: {} days", config.pipeline.readmission_window_days);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`PipelineConfig`] - Readmission window, worker threads, quality settings
//! - [`PrivacyConfig`] - Identity hashing salt
//! - [`StorageConfig`] - Warehouse table storage
//! - [`InputConfig`] - Default CSV input
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [pipeline]
//! readmission_window_days = 30
//! worker_threads = 0
//!
//! [privacy]
//! identity_salt = "${MERIDIAN_IDENTITY_SALT}"
//!
//! [storage]
//! backend = "json"
//! path = "./warehouse"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, InputConfig, LoggingConfig, MeridianConfig, PipelineConfig, PrivacyConfig,
    StorageBackend, StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
