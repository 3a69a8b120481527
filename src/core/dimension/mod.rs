//! Dimension building
//!
//! Reference dimensions (date, provider, facility, diagnosis, medication,
//! insurance) and the type-2 patient dimension are independent of one
//! another, so [`build_all`] builds them concurrently. The fact loader must not
//! start until `build_all` has returned.
//!
//! Aggregate attributes depend on the merged fact table and are refreshed
//! separately by [`aggregates::refresh_all`].

pub mod aggregates;
pub mod patient;
pub mod reference;
pub mod registry;

pub use patient::{build_patient_dimension, PatientDimension};
pub use reference::{build_reference_dimension, ReferenceDimension};
pub use registry::KeyRegistry;

use crate::core::temporal::AdmissionHistory;
use crate::domain::{DimensionKind, EnrichedEncounter, Result, SurrogateKey};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Row counts of one dimension table for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionBuildStats {
    pub table: String,
    /// Rows appended
    pub created: usize,
    /// Natural keys that already had a row
    pub reused: usize,
    /// Patient versions closed and reopened
    pub versioned: usize,
    /// Same-day corrections of a current patient version
    pub corrected: usize,
    /// Rows whose aggregate attributes changed in the refresh
    pub refreshed: usize,
}

impl DimensionBuildStats {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Existing rows whose content changed
    pub fn updated(&self) -> usize {
        self.versioned + self.corrected + self.refreshed
    }
}

/// Every reference dimension, keyed by kind
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDimensions {
    dimensions: BTreeMap<DimensionKind, ReferenceDimension>,
}

impl ReferenceDimensions {
    /// One empty dimension per kind
    pub fn empty() -> Self {
        Self::from_dimensions(Vec::new())
    }

    /// Collects dimensions, filling any missing kind with an empty one
    pub fn from_dimensions(dimensions: impl IntoIterator<Item = ReferenceDimension>) -> Self {
        let mut by_kind: BTreeMap<DimensionKind, ReferenceDimension> = dimensions
            .into_iter()
            .map(|dimension| (dimension.kind(), dimension))
            .collect();
        for kind in DimensionKind::ALL {
            by_kind
                .entry(kind)
                .or_insert_with(|| ReferenceDimension::empty(kind));
        }
        Self {
            dimensions: by_kind,
        }
    }

    pub fn get(&self, kind: DimensionKind) -> Option<&ReferenceDimension> {
        self.dimensions.get(&kind)
    }

    /// Surrogate key of a natural key in one dimension
    pub fn resolve(&self, kind: DimensionKind, natural_key: &str) -> Option<SurrogateKey> {
        self.dimensions
            .get(&kind)
            .and_then(|dimension| dimension.resolve(natural_key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceDimension> {
        self.dimensions.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ReferenceDimension> {
        self.dimensions.values_mut()
    }

    pub fn into_dimensions(self) -> impl Iterator<Item = ReferenceDimension> {
        self.dimensions.into_values()
    }
}

/// Output of [`build_all`]
#[derive(Debug, Clone)]
pub struct BuiltDimensions {
    pub reference: ReferenceDimensions,
    pub patients: PatientDimension,
    /// Reference tables first in kind order, patient table last
    pub stats: Vec<DimensionBuildStats>,
}

/// Builds all dimensions for a batch
///
/// Reference dimensions are built in parallel with each other and with the
/// patient dimension. `on_file` is the admission history of the stored fact
/// table, consulted by the patient dimension only.
///
/// # Errors
///
/// Propagates the patient dimension's as-of regression error.
pub fn build_all(
    reference: ReferenceDimensions,
    patients: PatientDimension,
    encounters: &[EnrichedEncounter],
    on_file: &AdmissionHistory,
    as_of: NaiveDate,
) -> Result<BuiltDimensions> {
    let (reference_results, patient_result) = rayon::join(
        || {
            reference
                .into_dimensions()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|dimension| build_reference_dimension(dimension, encounters))
                .collect::<Vec<_>>()
        },
        || build_patient_dimension(patients, encounters, on_file, as_of),
    );

    let (patients, patient_stats) = patient_result?;

    let mut stats = Vec::with_capacity(reference_results.len() + 1);
    let mut dimensions = Vec::with_capacity(reference_results.len());
    for (dimension, dimension_stats) in reference_results {
        dimensions.push(dimension);
        stats.push(dimension_stats);
    }
    stats.push(patient_stats);

    Ok(BuiltDimensions {
        reference: ReferenceDimensions::from_dimensions(dimensions),
        patients,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::temporal::TemporalAnalyzer;
    use crate::core::testing::{date, encounter};

    #[test]
    fn test_empty_holds_every_kind() {
        let dimensions = ReferenceDimensions::empty();
        assert_eq!(dimensions.iter().count(), DimensionKind::ALL.len());
        assert!(dimensions.iter().all(ReferenceDimension::is_empty));
    }

    #[test]
    fn test_build_all_reports_every_table() {
        let enriched = TemporalAnalyzer::default().analyze(vec![
            encounter("mae", "2024-02-01", "2024-02-03").build(),
            encounter("ned", "2024-02-01", "2024-02-02").hospital("St Luke").build(),
        ]);

        let built = build_all(
            ReferenceDimensions::empty(),
            PatientDimension::new(),
            &enriched,
            &AdmissionHistory::new(),
            date("2024-02-29"),
        )
        .unwrap();

        let tables: Vec<_> = built.stats.iter().map(|s| s.table.as_str()).collect();
        assert_eq!(
            tables,
            vec![
                "dim_date",
                "dim_provider",
                "dim_facility",
                "dim_diagnosis",
                "dim_medication",
                "dim_insurance",
                "dim_patient",
            ]
        );
        assert_eq!(built.patients.patient_count(), 2);
        assert_eq!(built.reference.get(DimensionKind::Facility).unwrap().len(), 2);
        assert_eq!(built.reference.get(DimensionKind::Date).unwrap().len(), 3);
    }
}
