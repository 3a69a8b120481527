//! Data quality harness
//!
//! Runs declarative checks over the loaded tables after each merge. The
//! harness only reads: a fatal failure marks the run as failed but the loaded
//! rows stay in place for inspection.
//!
//! # Example
//!
//! ```rust
//! use meridian::core::quality::QualityHarness;
//! use meridian::core::warehouse::Warehouse;
//!
//! let harness = QualityHarness::with_default_checks(365, 10, false);
//! let report = harness.run(&Warehouse::default().snapshot()).unwrap();
//! assert!(report.is_success());
//! ```

pub mod catalog;
pub mod check;
pub mod report;

pub use check::{Expectation, QualityCheck, Severity, TableRows};
pub use report::{QualityCheckResult, QualityReport};

use crate::core::dimension::patient::PATIENT_TABLE;
use crate::core::fact::FACT_TABLE;
use crate::core::warehouse::WarehouseSnapshot;
use crate::domain::{DimensionKind, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

/// Default number of violating keys kept per check
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct QualityHarness {
    checks: Vec<QualityCheck>,
    sample_size: usize,
    fail_on_warnings: bool,
}

impl QualityHarness {
    pub fn new(checks: Vec<QualityCheck>, sample_size: usize, fail_on_warnings: bool) -> Self {
        Self {
            checks,
            sample_size,
            fail_on_warnings,
        }
    }

    /// Harness with the standard check set
    pub fn with_default_checks(
        max_length_of_stay_days: u32,
        sample_size: usize,
        fail_on_warnings: bool,
    ) -> Self {
        Self::new(
            catalog::default_checks(max_length_of_stay_days),
            sample_size,
            fail_on_warnings,
        )
    }

    pub fn checks(&self) -> &[QualityCheck] {
        &self.checks
    }

    /// Runs every check against a snapshot
    ///
    /// # Errors
    ///
    /// Returns an error only if a table cannot be projected to JSON.
    pub fn run(&self, snapshot: &WarehouseSnapshot) -> Result<QualityReport> {
        let start = Instant::now();
        let tables = project(snapshot)?;
        self.run_on_tables(&tables, start)
    }

    /// Runs every check against pre-projected tables
    pub fn run_tables(&self, tables: &TableRows) -> Result<QualityReport> {
        self.run_on_tables(tables, Instant::now())
    }

    fn run_on_tables(&self, tables: &TableRows, start: Instant) -> Result<QualityReport> {
        let results: Vec<QualityCheckResult> = self
            .checks
            .par_iter()
            .map(|check| {
                let violations = check.evaluate(tables, self.sample_size);
                QualityCheckResult {
                    name: check.name.clone(),
                    table: check.table.clone(),
                    severity: check.severity,
                    violations: violations.count,
                    sample_keys: violations.sample_keys,
                }
            })
            .collect();

        let mut report = QualityReport::new(self.fail_on_warnings);
        for result in results {
            if !result.passed() {
                tracing::warn!(
                    check = %result.name,
                    severity = %result.severity,
                    violations = result.violations,
                    "Quality check failed"
                );
            }
            report.record(result);
        }
        report.set_duration(start.elapsed().as_millis() as u64);

        tracing::info!(
            checks = report.results.len(),
            passed = report.passed_count(),
            success = report.is_success(),
            "Quality harness complete"
        );

        Ok(report)
    }
}

/// Projects every table of a snapshot to JSON rows
pub fn project(snapshot: &WarehouseSnapshot) -> Result<TableRows> {
    let mut tables = TableRows::new();
    tables.insert(FACT_TABLE.to_string(), to_values(snapshot.facts())?);
    tables.insert(PATIENT_TABLE.to_string(), to_values(snapshot.patients())?);
    for kind in DimensionKind::ALL {
        tables.insert(kind.table_name(), to_values(snapshot.dimension(kind))?);
    }
    Ok(tables)
}

fn to_values<T: Serialize>(rows: &[T]) -> Result<Vec<serde_json::Value>> {
    rows.iter()
        .map(|row| serde_json::to_value(row).map_err(Into::into))
        .collect()
}
