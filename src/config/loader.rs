//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{MeridianConfig, StorageBackend};
use super::secret::secret_string;
use crate::domain::errors::WarehouseError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into MeridianConfig
/// 4. Applies environment variable overrides (MERIDIAN_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`WarehouseError::Configuration`] if the file cannot be read or
/// parsed, a referenced variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use meridian::config::loader::load_config;
///
/// let config = load_config("meridian.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MeridianConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(WarehouseError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        WarehouseError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text, applying substitution, overrides and validation
pub fn parse_config(contents: &str) -> Result<MeridianConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: MeridianConfig = toml::from_str(&contents)
        .map_err(|e| WarehouseError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        WarehouseError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| WarehouseError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{var_name}}}");
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(WarehouseError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        WarehouseError::Configuration(format!("Invalid value for {name}: '{value}'"))
    })
}

/// Applies environment variable overrides using MERIDIAN_* prefix
///
/// Environment variables follow the pattern: MERIDIAN_<SECTION>_<KEY>
/// For example: MERIDIAN_STORAGE_PATH, MERIDIAN_PIPELINE_WORKER_THREADS
///
/// # Errors
///
/// Returns an error if an override holds an unparseable value.
fn apply_env_overrides(config: &mut MeridianConfig) -> Result<()> {
    let var = |name: &str| std::env::var(name).ok();

    // Application overrides
    if let Some(val) = var("MERIDIAN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = var("MERIDIAN_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_env("MERIDIAN_APPLICATION_DRY_RUN", &val)?;
    }

    // Pipeline overrides
    if let Some(val) = var("MERIDIAN_PIPELINE_READMISSION_WINDOW_DAYS") {
        config.pipeline.readmission_window_days =
            parse_env("MERIDIAN_PIPELINE_READMISSION_WINDOW_DAYS", &val)?;
    }
    if let Some(val) = var("MERIDIAN_PIPELINE_WORKER_THREADS") {
        config.pipeline.worker_threads = parse_env("MERIDIAN_PIPELINE_WORKER_THREADS", &val)?;
    }
    if let Some(val) = var("MERIDIAN_PIPELINE_MAX_LENGTH_OF_STAY_DAYS") {
        config.pipeline.max_length_of_stay_days =
            parse_env("MERIDIAN_PIPELINE_MAX_LENGTH_OF_STAY_DAYS", &val)?;
    }
    if let Some(val) = var("MERIDIAN_PIPELINE_QUALITY_SAMPLE_SIZE") {
        config.pipeline.quality_sample_size =
            parse_env("MERIDIAN_PIPELINE_QUALITY_SAMPLE_SIZE", &val)?;
    }
    if let Some(val) = var("MERIDIAN_PIPELINE_FAIL_ON_WARNINGS") {
        config.pipeline.fail_on_warnings = parse_env("MERIDIAN_PIPELINE_FAIL_ON_WARNINGS", &val)?;
    }

    // Privacy overrides
    if let Some(val) = var("MERIDIAN_PRIVACY_IDENTITY_SALT") {
        config.privacy.identity_salt = Some(secret_string(val));
    }

    // Storage overrides
    if let Some(val) = var("MERIDIAN_STORAGE_BACKEND") {
        config.storage.backend = match val.to_lowercase().as_str() {
            "json" => StorageBackend::Json,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(WarehouseError::Configuration(format!(
                    "Invalid MERIDIAN_STORAGE_BACKEND '{other}'. Must be one of: json, memory"
                )))
            }
        };
    }
    if let Some(val) = var("MERIDIAN_STORAGE_PATH") {
        config.storage.path = val;
    }

    // Input overrides
    if let Some(val) = var("MERIDIAN_INPUT_PATH") {
        config.input.path = Some(val);
    }

    // Logging overrides
    if let Some(val) = var("MERIDIAN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_env("MERIDIAN_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Some(val) = var("MERIDIAN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
