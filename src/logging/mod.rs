//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted file logs with rotation
//! - Configurable log levels
//! - Run and stage event macros with consistent field names
//!
//! Identifying names never reach a log line; records are referred to by
//! source row, encounter key or identity hash prefix.
//!
//! # Example
//!
//! ```no_run
//! use meridian::logging::init_logging;
//! use meridian::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the completion of a pipeline stage
///
/// # Example
///
/// ```no_run
/// use meridian::log_stage_complete;
/// use std::time::Instant;
///
/// let started = Instant::now();
/// log_stage_complete!("ingest", 42, started.elapsed());
/// ```
#[macro_export]
macro_rules! log_stage_complete {
    ($stage:expr, $rows:expr, $elapsed:expr) => {
        tracing::info!(
            stage = $stage,
            rows = $rows,
            duration_ms = $elapsed.as_millis() as u64,
            "Stage complete"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use meridian::log_error_with_context;
/// use meridian::domain::WarehouseError;
///
/// let error = WarehouseError::Storage("disk full".to_string());
/// log_error_with_context!(&error, "Failed to persist warehouse");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
