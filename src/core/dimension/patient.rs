//! Type-2 patient dimension maintenance
//!
//! For every patient identity in a batch, the demographic snapshot of the
//! latest admission is compared with the current version on file:
//!
//! - unknown identity: a first version opens at the as-of date
//! - unchanged snapshot: nothing happens, the current key is reused
//! - changed snapshot, as-of after the current start: the current version is
//!   closed at the as-of date and a new one opens with a fresh key
//! - changed snapshot, as-of equal to the current start: same-day correction
//!   of the current version in place
//! - changed snapshot, as-of before the current start: the run fails
//! - changed snapshot from a batch older than the newest admission on file:
//!   nothing happens, the stale demographics never reach the current version

use super::DimensionBuildStats;
use crate::core::temporal::AdmissionHistory;
use crate::domain::{
    AgeGroup, EnrichedEncounter, PatientDimensionRow, PatientHistory, PatientIdentityHash,
    PatientSnapshot, Result, SurrogateKey, WarehouseError,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Table name consumers read
pub const PATIENT_TABLE: &str = "dim_patient";

/// All patient histories plus the key sequence shared by their versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDimension {
    histories: BTreeMap<PatientIdentityHash, PatientHistory>,
    next_key: SurrogateKey,
}

impl Default for PatientDimension {
    fn default() -> Self {
        Self {
            histories: BTreeMap::new(),
            next_key: SurrogateKey::FIRST,
        }
    }
}

impl PatientDimension {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self, identity: &PatientIdentityHash) -> Option<&PatientHistory> {
        self.histories.get(identity)
    }

    /// Histories in identity-hash order
    pub fn histories(&self) -> impl Iterator<Item = &PatientHistory> {
        self.histories.values()
    }

    pub(crate) fn histories_mut(&mut self) -> impl Iterator<Item = &mut PatientHistory> {
        self.histories.values_mut()
    }

    /// Key of the current version of `identity`
    pub fn current_key(&self, identity: &PatientIdentityHash) -> Option<SurrogateKey> {
        self.histories
            .get(identity)
            .map(|history| history.current().patient_key)
    }

    /// Whether any version of any patient carries `key`
    pub fn contains_key(&self, key: SurrogateKey) -> bool {
        self.histories.values().any(|history| history.owns_key(key))
    }

    /// Identity behind every patient key, closed versions included
    pub fn key_owners(&self) -> BTreeMap<SurrogateKey, &PatientIdentityHash> {
        self.histories
            .iter()
            .flat_map(|(identity, history)| {
                history
                    .versions()
                    .map(move |version| (version.patient_key, identity))
            })
            .collect()
    }

    pub fn patient_count(&self) -> usize {
        self.histories.len()
    }

    /// Flattened version rows, identity order then version order
    pub fn rows(&self) -> Vec<PatientDimensionRow> {
        self.histories
            .values()
            .flat_map(PatientHistory::to_rows)
            .collect()
    }

    fn allocate_key(&mut self) -> SurrogateKey {
        let key = self.next_key;
        self.next_key = key.next();
        key
    }
}

/// Snapshot carried by an encounter
pub fn snapshot_of(encounter: &EnrichedEncounter) -> PatientSnapshot {
    PatientSnapshot {
        age_group: AgeGroup::from_age(encounter.encounter.age),
        gender: encounter.encounter.gender.clone(),
        blood_type: encounter.encounter.blood_type.clone(),
    }
}

/// Latest encounter per identity in a batch
///
/// "Latest" is the encounter with the greatest admission date, ties broken by
/// encounter key, matching the temporal sort order.
fn latest_encounters(
    encounters: &[EnrichedEncounter],
) -> BTreeMap<PatientIdentityHash, &EnrichedEncounter> {
    let mut latest: BTreeMap<PatientIdentityHash, &EnrichedEncounter> = BTreeMap::new();
    for encounter in encounters {
        latest
            .entry(encounter.patient_identity_hash().clone())
            .and_modify(|current| {
                let newer = (encounter.encounter.admission_date, encounter.encounter_key())
                    > (current.encounter.admission_date, current.encounter_key());
                if newer {
                    *current = encounter;
                }
            })
            .or_insert(encounter);
    }
    latest
}

/// Latest snapshot per identity in a batch
pub fn latest_snapshots(
    encounters: &[EnrichedEncounter],
) -> BTreeMap<PatientIdentityHash, PatientSnapshot> {
    latest_encounters(encounters)
        .into_iter()
        .map(|(identity, encounter)| (identity, snapshot_of(encounter)))
        .collect()
}

/// Applies a batch to the patient dimension
///
/// `on_file` holds the admissions already in the fact table. A batch whose
/// latest admission for a patient is older than the newest one on file
/// carries stale demographics and leaves that patient's versions alone.
///
/// # Errors
///
/// Returns [`WarehouseError::State`] when a changed snapshot would need to
/// close a version that starts after `as_of`. Nothing is partially applied
/// from the caller's point of view, since the dimension is taken by value.
pub fn build_patient_dimension(
    mut dimension: PatientDimension,
    encounters: &[EnrichedEncounter],
    on_file: &AdmissionHistory,
    as_of: NaiveDate,
) -> Result<(PatientDimension, DimensionBuildStats)> {
    let mut stats = DimensionBuildStats::new(PATIENT_TABLE);

    for (identity, latest) in latest_encounters(encounters) {
        let snapshot = snapshot_of(latest);
        let Some(current) = dimension.history(&identity).map(|h| h.current().clone()) else {
            let key = dimension.allocate_key();
            dimension.histories.insert(
                identity.clone(),
                PatientHistory::new(identity, key, snapshot, as_of),
            );
            stats.created += 1;
            continue;
        };

        if current.snapshot == snapshot {
            stats.reused += 1;
            continue;
        }

        let stale = on_file
            .latest_admission(&identity)
            .is_some_and(|newest| latest.encounter.admission_date < newest);
        if stale {
            stats.reused += 1;
            tracing::debug!(
                patient = identity.short(),
                batch_admission = %latest.encounter.admission_date,
                "Kept current patient version; newer admission on file"
            );
            continue;
        }

        if as_of < current.effective_from {
            return Err(WarehouseError::State(format!(
                "As-of date {as_of} precedes current version start {} of patient {}",
                current.effective_from,
                identity.short()
            )));
        }

        if as_of == current.effective_from {
            if let Some(history) = dimension.histories.get_mut(&identity) {
                history.correct_current(snapshot);
            }
            stats.corrected += 1;
            tracing::debug!(patient = identity.short(), "Corrected current patient version");
            continue;
        }

        let key = dimension.allocate_key();
        if let Some(history) = dimension.histories.get_mut(&identity) {
            history
                .supersede(key, snapshot, as_of)
                .map_err(WarehouseError::State)?;
        }
        stats.versioned += 1;
        tracing::debug!(
            patient = identity.short(),
            new_key = %key,
            "Opened new patient version"
        );
    }

    tracing::debug!(
        created = stats.created,
        versioned = stats.versioned,
        corrected = stats.corrected,
        patients = dimension.patient_count(),
        "Patient dimension built"
    );

    Ok((dimension, stats))
}
