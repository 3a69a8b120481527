//! Fact table and incremental fact loading
//!
//! The loader resolves every foreign key of an enriched encounter against the
//! dimensions as they stand after the build step, then merges the row into
//! the fact table by encounter key. Re-merging an unchanged row is a no-op, so
//! re-running a batch is the recovery path after a partial failure.

use crate::core::dimension::reference::date_key;
use crate::core::dimension::{PatientDimension, ReferenceDimensions};
use crate::domain::{
    DimensionKind, EncounterKey, EnrichedEncounter, FactEncounterRow, SurrogateKey,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Table name consumers read
pub const FACT_TABLE: &str = "fact_encounter";

/// Encounter fact rows keyed by encounter key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FactEncounterRow>", into = "Vec<FactEncounterRow>")]
pub struct FactTable {
    rows: BTreeMap<EncounterKey, FactEncounterRow>,
}

impl From<Vec<FactEncounterRow>> for FactTable {
    fn from(rows: Vec<FactEncounterRow>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| (row.encounter_key.clone(), row))
                .collect(),
        }
    }
}

impl From<FactTable> for Vec<FactEncounterRow> {
    fn from(table: FactTable) -> Self {
        table.rows.into_values().collect()
    }
}

impl FactTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &EncounterKey) -> Option<&FactEncounterRow> {
        self.rows.get(key)
    }

    /// Rows in encounter-key order
    pub fn rows(&self) -> impl Iterator<Item = &FactEncounterRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An encounter excluded from the fact table because a key did not resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionResolutionFailure {
    pub encounter_key: EncounterKey,
    pub source_row: usize,
    /// Table whose lookup failed
    pub dimension: String,
    /// Natural key that was looked up
    pub natural_key: String,
}

/// Counts of one merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub quarantined: Vec<DimensionResolutionFailure>,
}

impl MergeOutcome {
    /// Rows whose content changed
    pub fn net_changes(&self) -> usize {
        self.inserted + self.updated
    }

    /// Distinct encounters held out of the fact table
    ///
    /// `quarantined` lists one failure per unresolved key, so an encounter
    /// missing several keys appears there several times.
    pub fn quarantined_encounters(&self) -> usize {
        self.quarantined
            .iter()
            .map(|failure| &failure.encounter_key)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Merges enriched encounters into the fact table
#[derive(Debug, Clone, Copy, Default)]
pub struct FactLoader;

impl FactLoader {
    pub fn new() -> Self {
        Self
    }

    /// Resolves keys and merges rows
    ///
    /// Takes the current table by value and returns the merged one. Encounters
    /// whose keys do not all resolve are quarantined and leave any existing
    /// row for their encounter key untouched.
    ///
    /// New encounters point at the patient's current version. A row already
    /// on file keeps the version it was loaded against as long as that
    /// version belongs to the same patient, so re-running an older batch
    /// after the patient was re-versioned does not rewrite its rows.
    pub fn merge(
        &self,
        mut table: FactTable,
        encounters: &[EnrichedEncounter],
        dimensions: &ReferenceDimensions,
        patients: &PatientDimension,
    ) -> (FactTable, MergeOutcome) {
        let resolved: Vec<_> = encounters
            .par_iter()
            .map(|encounter| {
                let existing = table.rows.get(encounter.encounter_key());
                resolve_row(encounter, existing, dimensions, patients)
            })
            .collect();

        let mut outcome = MergeOutcome::default();
        for result in resolved {
            let row = match result {
                Ok(row) => row,
                Err(failures) => {
                    for failure in &failures {
                        tracing::warn!(
                            encounter_key = failure.encounter_key.short(),
                            source_row = failure.source_row,
                            dimension = %failure.dimension,
                            "Quarantined encounter with unresolved dimension key"
                        );
                    }
                    outcome.quarantined.extend(failures);
                    continue;
                }
            };

            match table.rows.get(&row.encounter_key) {
                Some(existing) if *existing == row => outcome.unchanged += 1,
                Some(_) => {
                    outcome.updated += 1;
                    table.rows.insert(row.encounter_key.clone(), row);
                }
                None => {
                    outcome.inserted += 1;
                    table.rows.insert(row.encounter_key.clone(), row);
                }
            }
        }

        tracing::info!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            unchanged = outcome.unchanged,
            quarantined = outcome.quarantined_encounters(),
            total_rows = table.len(),
            "Fact merge complete"
        );

        (table, outcome)
    }
}

/// Builds a fact row, or lists every key that failed to resolve
fn resolve_row(
    enriched: &EnrichedEncounter,
    existing: Option<&FactEncounterRow>,
    dimensions: &ReferenceDimensions,
    patients: &PatientDimension,
) -> Result<FactEncounterRow, Vec<DimensionResolutionFailure>> {
    let encounter = &enriched.encounter;
    let mut failures = Vec::new();

    let mut lookup = |table: String, natural_key: String, key: Option<SurrogateKey>| {
        if key.is_none() {
            failures.push(DimensionResolutionFailure {
                encounter_key: encounter.encounter_key.clone(),
                source_row: encounter.source_row,
                dimension: table,
                natural_key,
            });
        }
        key
    };

    let mut reference = |kind: DimensionKind, natural_key: String| {
        let key = dimensions.resolve(kind, &natural_key);
        lookup(kind.table_name(), natural_key, key)
    };

    let admission_date_key = reference(DimensionKind::Date, date_key(encounter.admission_date));
    let discharge_date_key = reference(DimensionKind::Date, date_key(encounter.discharge_date));
    let provider_key = reference(DimensionKind::Provider, encounter.doctor.clone());
    let facility_key = reference(DimensionKind::Facility, encounter.hospital.clone());
    let diagnosis_key = reference(DimensionKind::Diagnosis, encounter.medical_condition.clone());
    let medication_key = reference(DimensionKind::Medication, encounter.medication.clone());
    let insurance_key = reference(
        DimensionKind::Insurance,
        encounter.insurance_provider.clone(),
    );
    let loaded_version = existing.map(|row| row.patient_key).filter(|key| {
        patients
            .history(&encounter.patient_identity_hash)
            .is_some_and(|history| history.owns_key(*key))
    });
    let patient_key = lookup(
        crate::core::dimension::patient::PATIENT_TABLE.to_string(),
        encounter.patient_identity_hash.to_string(),
        loaded_version.or_else(|| patients.current_key(&encounter.patient_identity_hash)),
    );

    match (
        patient_key,
        admission_date_key,
        discharge_date_key,
        provider_key,
        facility_key,
        diagnosis_key,
        medication_key,
        insurance_key,
    ) {
        (
            Some(patient_key),
            Some(admission_date_key),
            Some(discharge_date_key),
            Some(provider_key),
            Some(facility_key),
            Some(diagnosis_key),
            Some(medication_key),
            Some(insurance_key),
        ) => Ok(FactEncounterRow {
            encounter_key: encounter.encounter_key.clone(),
            patient_key,
            admission_date_key,
            discharge_date_key,
            provider_key,
            facility_key,
            diagnosis_key,
            medication_key,
            insurance_key,
            admission_date: encounter.admission_date,
            discharge_date: encounter.discharge_date,
            age: encounter.age,
            age_group: enriched.age_group,
            billing_amount: encounter.billing_amount,
            room_number: encounter.room_number,
            length_of_stay: enriched.length_of_stay,
            cost_per_day: enriched.cost_per_day,
            season: enriched.season,
            admission_type: encounter.admission_type,
            is_emergency: enriched.is_emergency,
            test_results: encounter.test_results.clone(),
            days_since_last_admission: enriched.days_since_last_admission,
            is_readmission: enriched.is_readmission,
            previous_admission_count: enriched.previous_admission_count,
        }),
        _ => Err(failures),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dimension::{build_all, PatientDimension, ReferenceDimensions};
    use crate::core::temporal::{AdmissionHistory, TemporalAnalyzer};
    use crate::core::testing::{date, encounter};
    use crate::domain::CleanedEncounter;

    fn load(
        table: FactTable,
        records: Vec<CleanedEncounter>,
        dimensions: ReferenceDimensions,
        patients: PatientDimension,
    ) -> (FactTable, MergeOutcome, ReferenceDimensions, PatientDimension) {
        let enriched = TemporalAnalyzer::default().analyze(records);
        let built = build_all(
            dimensions,
            patients,
            &enriched,
            &AdmissionHistory::new(),
            date("2024-12-31"),
        )
        .unwrap();
        let (table, outcome) =
            FactLoader::new().merge(table, &enriched, &built.reference, &built.patients);
        (table, outcome, built.reference, built.patients)
    }

    fn batch() -> Vec<CleanedEncounter> {
        vec![
            encounter("kai", "2024-04-01", "2024-04-03").build(),
            encounter("kai", "2024-04-11", "2024-04-12").build(),
            encounter("lou", "2024-04-02", "2024-04-02").build(),
        ]
    }

    #[test]
    fn test_first_merge_inserts_every_row() {
        let (table, outcome, _, _) = load(
            FactTable::new(),
            batch(),
            ReferenceDimensions::empty(),
            PatientDimension::new(),
        );

        assert_eq!(outcome.inserted, 3);
        assert_eq!(table.len(), 3);
        assert!(outcome.quarantined.is_empty());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let (table, _, dimensions, patients) = load(
            FactTable::new(),
            batch(),
            ReferenceDimensions::empty(),
            PatientDimension::new(),
        );
        let before = table.clone();

        let (table, outcome, _, _) = load(table, batch(), dimensions, patients);

        assert_eq!(outcome.net_changes(), 0);
        assert_eq!(outcome.unchanged, 3);
        assert_eq!(table, before);
    }

    #[test]
    fn test_corrected_amount_updates_only_that_row() {
        let (table, _, dimensions, patients) = load(
            FactTable::new(),
            batch(),
            ReferenceDimensions::empty(),
            PatientDimension::new(),
        );
        let before = table.clone();

        let mut corrected = batch();
        corrected[2] = encounter("lou", "2024-04-02", "2024-04-02").amount(1500.0).build();
        let changed_key = corrected[2].encounter_key.clone();

        let (table, outcome, _, _) = load(table, corrected, dimensions, patients);

        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.unchanged, 2);
        assert_eq!(table.get(&changed_key).unwrap().billing_amount, 1500.0);
        for row in table.rows().filter(|row| row.encounter_key != changed_key) {
            assert_eq!(Some(row), before.get(&row.encounter_key));
        }
    }

    #[test]
    fn test_unresolvable_keys_are_quarantined() {
        let enriched = TemporalAnalyzer::default().analyze(batch());

        let (table, outcome) = FactLoader::new().merge(
            FactTable::new(),
            &enriched,
            &ReferenceDimensions::empty(),
            &PatientDimension::new(),
        );

        assert!(table.is_empty());
        assert_eq!(outcome.inserted, 0);
        // seven reference lookups plus the patient lookup per encounter
        assert_eq!(outcome.quarantined.len(), 3 * 8);
        assert_eq!(outcome.quarantined_encounters(), 3);
        assert!(outcome
            .quarantined
            .iter()
            .any(|failure| failure.dimension == "dim_patient"));
    }

    #[test]
    fn test_fact_table_serializes_as_row_list() {
        let (table, _, _, _) = load(
            FactTable::new(),
            batch(),
            ReferenceDimensions::empty(),
            PatientDimension::new(),
        );

        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 3);

        let restored: FactTable = serde_json::from_value(json).unwrap();
        assert_eq!(restored, table);
    }

    #[test]
    fn test_loaded_row_keeps_its_patient_version() {
        let (table, _, dimensions, patients) = load(
            FactTable::new(),
            batch(),
            ReferenceDimensions::empty(),
            PatientDimension::new(),
        );
        let lou = encounter("lou", "2024-04-02", "2024-04-02").build();
        let loaded_key = table.get(&lou.encounter_key).unwrap().patient_key;

        // A later visit with new demographics opens a second version
        let later = TemporalAnalyzer::default()
            .analyze(vec![encounter("lou", "2024-09-01", "2024-09-02").age(70).build()]);
        let built = build_all(
            dimensions,
            patients,
            &later,
            &AdmissionHistory::new(),
            date("2025-01-31"),
        )
        .unwrap();
        let current_key = built.patients.current_key(&lou.patient_identity_hash).unwrap();
        assert_ne!(current_key, loaded_key);

        let reloaded = TemporalAnalyzer::default().analyze(batch());
        let (table, outcome) =
            FactLoader::new().merge(table, &reloaded, &built.reference, &built.patients);
        assert_eq!(outcome.net_changes(), 0);
        assert_eq!(table.get(&lou.encounter_key).unwrap().patient_key, loaded_key);

        let (table, outcome) =
            FactLoader::new().merge(table, &later, &built.reference, &built.patients);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(table.get(later[0].encounter_key()).unwrap().patient_key, current_key);
    }
}
