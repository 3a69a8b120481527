//! Reference dimension building
//!
//! Registers every natural key observed in a batch and appends a row for each
//! key seen for the first time. Aggregate attributes start empty here and are
//! filled by the aggregate refresh once facts are merged.

use super::registry::KeyRegistry;
use super::DimensionBuildStats;
use crate::domain::dimension::{
    DateAttributes, DiagnosisAttributes, FacilityAttributes, InsuranceAttributes,
    MedicationAttributes, ProviderAttributes,
};
use crate::domain::{
    CleanedEncounter, DimensionAttributes, DimensionKind, EnrichedEncounter,
    ReferenceDimensionRow, Season, SurrogateKey,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format of date natural keys
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// A reference dimension with its key registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDimension {
    kind: DimensionKind,
    registry: KeyRegistry,
    rows: BTreeMap<SurrogateKey, ReferenceDimensionRow>,
}

impl ReferenceDimension {
    pub fn empty(kind: DimensionKind) -> Self {
        Self {
            kind,
            registry: KeyRegistry::new(),
            rows: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DimensionKind {
        self.kind
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Surrogate key of a natural key
    pub fn resolve(&self, natural_key: &str) -> Option<SurrogateKey> {
        self.registry.get(natural_key)
    }

    pub fn row(&self, key: SurrogateKey) -> Option<&ReferenceDimensionRow> {
        self.rows.get(&key)
    }

    pub fn contains_key(&self, key: SurrogateKey) -> bool {
        self.rows.contains_key(&key)
    }

    /// Rows in surrogate-key order
    pub fn rows(&self) -> impl Iterator<Item = &ReferenceDimensionRow> {
        self.rows.values()
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut ReferenceDimensionRow> {
        self.rows.values_mut()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Registers a natural key, appending a row if it is new
    fn register(&mut self, natural_key: &str) -> bool {
        let (key, created) = self.registry.get_or_assign(natural_key);
        if created {
            self.rows.insert(
                key,
                ReferenceDimensionRow {
                    surrogate_key: key,
                    natural_key: natural_key.to_string(),
                    attributes: initial_attributes(self.kind, natural_key),
                },
            );
        }
        created
    }
}

/// Natural keys an encounter contributes to a dimension
///
/// The date dimension receives both the admission and the discharge date.
pub fn natural_keys(kind: DimensionKind, encounter: &CleanedEncounter) -> Vec<String> {
    match kind {
        DimensionKind::Date => vec![
            date_key(encounter.admission_date),
            date_key(encounter.discharge_date),
        ],
        DimensionKind::Provider => vec![encounter.doctor.clone()],
        DimensionKind::Facility => vec![encounter.hospital.clone()],
        DimensionKind::Diagnosis => vec![encounter.medical_condition.clone()],
        DimensionKind::Medication => vec![encounter.medication.clone()],
        DimensionKind::Insurance => vec![encounter.insurance_provider.clone()],
    }
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// Extends a reference dimension with a batch's natural keys
///
/// Takes the persisted dimension by value and returns the extended one.
/// Existing keys are reused; new keys get the next unused surrogate key.
pub fn build_reference_dimension(
    mut dimension: ReferenceDimension,
    encounters: &[EnrichedEncounter],
) -> (ReferenceDimension, DimensionBuildStats) {
    let mut stats = DimensionBuildStats::new(dimension.kind().table_name());

    for enriched in encounters {
        for natural_key in natural_keys(dimension.kind(), &enriched.encounter) {
            if dimension.register(&natural_key) {
                stats.created += 1;
            } else {
                stats.reused += 1;
            }
        }
    }

    tracing::debug!(
        dimension = %dimension.kind(),
        created = stats.created,
        total_rows = dimension.len(),
        "Reference dimension built"
    );

    (dimension, stats)
}

fn initial_attributes(kind: DimensionKind, natural_key: &str) -> DimensionAttributes {
    match kind {
        DimensionKind::Date => match NaiveDate::parse_from_str(natural_key, DATE_KEY_FORMAT) {
            Ok(date) => DimensionAttributes::Date(calendar_attributes(date)),
            Err(_) => {
                tracing::warn!(natural_key, "Date dimension key is not an ISO date");
                DimensionAttributes::Date(calendar_attributes(NaiveDate::MIN))
            }
        },
        DimensionKind::Provider => DimensionAttributes::Provider(ProviderAttributes::default()),
        DimensionKind::Facility => DimensionAttributes::Facility(FacilityAttributes::default()),
        DimensionKind::Diagnosis => DimensionAttributes::Diagnosis(DiagnosisAttributes::default()),
        DimensionKind::Medication => {
            DimensionAttributes::Medication(MedicationAttributes::default())
        }
        DimensionKind::Insurance => DimensionAttributes::Insurance(InsuranceAttributes::default()),
    }
}

/// Descriptive calendar attributes of a date
pub fn calendar_attributes(date: NaiveDate) -> DateAttributes {
    let weekday = date.weekday().number_from_monday();
    DateAttributes {
        date,
        year: date.year(),
        quarter: (date.month() - 1) / 3 + 1,
        month: date.month(),
        month_name: date.format("%B").to_string(),
        day_of_week: weekday,
        is_weekend: weekday >= 6,
        season: Season::from_date(date),
        admissions: 0,
        total_billing: 0.0,
    }
}
