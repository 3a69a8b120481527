//! Quality report structures

use super::check::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheckResult {
    pub name: String,
    pub table: String,
    pub severity: Severity,
    /// Number of violating rows (or groups, for group-level checks)
    pub violations: usize,
    /// Bounded sample of violating keys
    pub sample_keys: Vec<String>,
}

impl QualityCheckResult {
    pub fn passed(&self) -> bool {
        self.violations == 0
    }
}

/// Results of every check in one harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub checked_at: DateTime<Utc>,
    pub results: Vec<QualityCheckResult>,
    pub duration_ms: u64,
    /// Whether failed warnings count toward overall failure
    pub fail_on_warnings: bool,
}

impl QualityReport {
    pub fn new(fail_on_warnings: bool) -> Self {
        Self {
            checked_at: Utc::now(),
            results: Vec::new(),
            duration_ms: 0,
            fail_on_warnings,
        }
    }

    pub fn record(&mut self, result: QualityCheckResult) {
        self.results.push(result);
    }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }

    /// Failed checks of the given severity
    pub fn failures(&self, severity: Severity) -> impl Iterator<Item = &QualityCheckResult> {
        self.results
            .iter()
            .filter(move |result| result.severity == severity && !result.passed())
    }

    /// Names of the checks that fail the run
    pub fn failing_checks(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|result| !result.passed())
            .filter(|result| result.severity == Severity::Fatal || self.fail_on_warnings)
            .map(|result| result.name.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failing_checks().is_empty()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|result| result.passed()).count()
    }

    /// Format the report as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("🔎 Quality Report\n");
        summary.push_str(&format!("  Checked at: {}\n", self.checked_at));
        summary.push_str(&format!("  Duration: {} ms\n", self.duration_ms));
        summary.push_str(&format!(
            "  Checks passed: {}/{}\n",
            self.passed_count(),
            self.results.len()
        ));

        for severity in [Severity::Fatal, Severity::Warning] {
            let failed: Vec<_> = self.failures(severity).collect();
            if failed.is_empty() {
                continue;
            }
            let marker = match severity {
                Severity::Fatal => "❌",
                Severity::Warning => "⚠️ ",
            };
            summary.push_str(&format!("\n{marker} Failed {severity} checks:\n"));
            for result in failed {
                summary.push_str(&format!(
                    "  - {} ({} violation(s))\n",
                    result.name, result.violations
                ));
                if !result.sample_keys.is_empty() {
                    summary.push_str(&format!("    Sample: {}\n", result.sample_keys.join(", ")));
                }
            }
        }

        summary
    }
}
