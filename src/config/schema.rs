//! Configuration schema types
//!
//! This module defines the configuration structure for Meridian. Every section
//! except `[storage]` has defaults, so a minimal file only names the store.

use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON document per table under `storage.path`
    #[default]
    Json,
    /// Process-local tables, lost on exit
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Main Meridian configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MeridianConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Pipeline stage settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Identity hashing settings
    #[serde(default)]
    pub privacy: PrivacyConfig,

    /// Warehouse table storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Default input source
    #[serde(default)]
    pub input: InputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MeridianConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.pipeline.validate()?;
        self.privacy.validate()?;
        self.storage.validate()?;
        self.input.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (run every stage but persist nothing)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Pipeline stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum admission-to-admission gap, in days, counted as a readmission
    #[serde(default = "default_readmission_window_days")]
    pub readmission_window_days: u32,

    /// Worker threads for the CPU stages (0 = one per core)
    #[serde(default)]
    pub worker_threads: usize,

    /// Upper bound of the length-of-stay quality check
    #[serde(default = "default_max_length_of_stay_days")]
    pub max_length_of_stay_days: u32,

    /// Violating keys kept per quality check
    #[serde(default = "default_quality_sample_size")]
    pub quality_sample_size: usize,

    /// Treat failed warning checks as run failures
    #[serde(default)]
    pub fail_on_warnings: bool,

    /// chrono format of the two date columns
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.readmission_window_days == 0 {
            return Err("pipeline.readmission_window_days must be > 0".to_string());
        }
        if self.readmission_window_days > 365 {
            return Err("pipeline.readmission_window_days must be <= 365".to_string());
        }
        if self.worker_threads > 256 {
            return Err("pipeline.worker_threads must be <= 256".to_string());
        }
        if self.max_length_of_stay_days == 0 {
            return Err("pipeline.max_length_of_stay_days must be > 0".to_string());
        }
        if self.quality_sample_size == 0 || self.quality_sample_size > 1000 {
            return Err("pipeline.quality_sample_size must be between 1 and 1000".to_string());
        }
        if !self.date_format.contains("%Y") && !self.date_format.contains("%y") {
            return Err(format!(
                "pipeline.date_format '{}' has no year specifier",
                self.date_format
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            readmission_window_days: default_readmission_window_days(),
            worker_threads: 0,
            max_length_of_stay_days: default_max_length_of_stay_days(),
            quality_sample_size: default_quality_sample_size(),
            fail_on_warnings: false,
            date_format: default_date_format(),
        }
    }
}

/// Identity hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrivacyConfig {
    /// Salt mixed into every identity hash and encounter key
    /// Stored securely in memory and automatically zeroized on drop.
    /// Must not change between runs against the same store.
    #[serde(default)]
    pub identity_salt: Option<SecretString>,
}

impl PrivacyConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if let Some(salt) = &self.identity_salt {
            if salt.expose_secret().is_empty() {
                return Err(
                    "privacy.identity_salt cannot be empty; omit it to hash without a salt"
                        .to_string(),
                );
            }
        }
        Ok(())
    }
}

/// Warehouse storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend (json or memory)
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding the JSON tables
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.backend == StorageBackend::Json && self.path.trim().is_empty() {
            return Err("storage.path is required when storage.backend = 'json'".to_string());
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

/// Input configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InputConfig {
    /// CSV file read when `run` is given no `--input`
    #[serde(default)]
    pub path: Option<String>,
}

impl InputConfig {
    fn validate(&self) -> Result<(), String> {
        if let Some(path) = &self.path {
            if path.trim().is_empty() {
                return Err("input.path cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path is required when local logging is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_readmission_window_days() -> u32 {
    30
}

fn default_max_length_of_stay_days() -> u32 {
    365
}

fn default_quality_sample_size() -> usize {
    10
}

fn default_date_format() -> String {
    crate::core::normalize::DEFAULT_DATE_FORMAT.to_string()
}

fn default_storage_path() -> String {
    "./warehouse".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
