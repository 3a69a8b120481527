//! Temporal analysis
//!
//! The only stage that needs the whole batch at once. Cleaned encounters are
//! grouped into explicit per-patient partitions, each sorted by admission date
//! with the encounter key as tie-breaker, and every partition is enriched
//! independently. Partitions run in parallel on the current rayon pool.
//!
//! Readmission gaps are measured admission to admission. Admissions already
//! in the fact table count as prior visits through [`AdmissionHistory`], so a
//! patient split across batches gets the same features as one loaded whole.

use crate::domain::{
    AgeGroup, CleanedEncounter, EncounterKey, EnrichedEncounter, PatientIdentityHash, Season,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Default readmission window in days
pub const DEFAULT_READMISSION_WINDOW_DAYS: i64 = 30;

/// Admissions on file, per patient identity, in (date, key) order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdmissionHistory {
    by_patient: BTreeMap<PatientIdentityHash, Vec<(NaiveDate, EncounterKey)>>,
}

impl AdmissionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one stored admission
    pub fn record(
        &mut self,
        identity: PatientIdentityHash,
        admission_date: NaiveDate,
        encounter_key: EncounterKey,
    ) {
        let admissions = self.by_patient.entry(identity).or_default();
        let entry = (admission_date, encounter_key);
        if let Err(position) = admissions.binary_search(&entry) {
            admissions.insert(position, entry);
        }
    }

    /// Stored admissions of one patient, oldest first
    pub fn admissions(&self, identity: &PatientIdentityHash) -> &[(NaiveDate, EncounterKey)] {
        self.by_patient
            .get(identity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Most recent admission date on file for `identity`
    pub fn latest_admission(&self, identity: &PatientIdentityHash) -> Option<NaiveDate> {
        self.admissions(identity).last().map(|(date, _)| *date)
    }

    pub fn patient_count(&self) -> usize {
        self.by_patient.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_patient.is_empty()
    }
}

impl FromIterator<(PatientIdentityHash, NaiveDate, EncounterKey)> for AdmissionHistory {
    fn from_iter<I: IntoIterator<Item = (PatientIdentityHash, NaiveDate, EncounterKey)>>(
        iter: I,
    ) -> Self {
        let mut by_patient: BTreeMap<PatientIdentityHash, Vec<(NaiveDate, EncounterKey)>> =
            BTreeMap::new();
        for (identity, admission_date, encounter_key) in iter {
            by_patient
                .entry(identity)
                .or_default()
                .push((admission_date, encounter_key));
        }
        for admissions in by_patient.values_mut() {
            admissions.sort();
            admissions.dedup();
        }
        Self { by_patient }
    }
}

/// All encounters of one patient, in admission order
#[derive(Debug, Clone, PartialEq)]
pub struct PatientPartition {
    identity_hash: PatientIdentityHash,
    encounters: Vec<CleanedEncounter>,
}

impl PatientPartition {
    /// Builds a partition, sorting by admission date then encounter key
    pub fn new(identity_hash: PatientIdentityHash, mut encounters: Vec<CleanedEncounter>) -> Self {
        encounters.sort_by(|a, b| {
            a.admission_date
                .cmp(&b.admission_date)
                .then_with(|| a.encounter_key.cmp(&b.encounter_key))
        });
        Self {
            identity_hash,
            encounters,
        }
    }

    pub fn identity_hash(&self) -> &PatientIdentityHash {
        &self.identity_hash
    }

    pub fn encounters(&self) -> &[CleanedEncounter] {
        &self.encounters
    }

    pub fn len(&self) -> usize {
        self.encounters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encounters.is_empty()
    }
}

/// Groups encounters by patient identity
///
/// Partitions come back ordered by identity hash so downstream output does
/// not depend on input order.
pub fn partition_by_patient(encounters: Vec<CleanedEncounter>) -> Vec<PatientPartition> {
    let mut groups: BTreeMap<PatientIdentityHash, Vec<CleanedEncounter>> = BTreeMap::new();
    for encounter in encounters {
        groups
            .entry(encounter.patient_identity_hash.clone())
            .or_default()
            .push(encounter);
    }

    groups
        .into_iter()
        .map(|(identity_hash, encounters)| PatientPartition::new(identity_hash, encounters))
        .collect()
}

/// Derives per-record and per-patient features
#[derive(Debug, Clone, Copy)]
pub struct TemporalAnalyzer {
    readmission_window_days: i64,
}

impl Default for TemporalAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_READMISSION_WINDOW_DAYS)
    }
}

impl TemporalAnalyzer {
    pub fn new(readmission_window_days: i64) -> Self {
        Self {
            readmission_window_days,
        }
    }

    /// Enriches a batch with no admissions on file
    pub fn analyze(&self, encounters: Vec<CleanedEncounter>) -> Vec<EnrichedEncounter> {
        self.analyze_with_history(encounters, &AdmissionHistory::default())
    }

    /// Enriches a batch against the admissions already stored
    ///
    /// Output holds the batch's encounters only, grouped by patient (identity
    /// hash order) and in admission order within each patient.
    pub fn analyze_with_history(
        &self,
        encounters: Vec<CleanedEncounter>,
        history: &AdmissionHistory,
    ) -> Vec<EnrichedEncounter> {
        let partitions = partition_by_patient(encounters);

        tracing::debug!(
            patients = partitions.len(),
            patients_on_file = history.patient_count(),
            window_days = self.readmission_window_days,
            "Analyzing patient partitions"
        );

        partitions
            .into_par_iter()
            .map(|partition| self.enrich_partition(partition, history))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Enriches one patient's encounters
    ///
    /// Stored admissions that share an encounter key with the partition are
    /// the same visits being reloaded and are not counted twice.
    pub fn enrich_partition(
        &self,
        partition: PatientPartition,
        history: &AdmissionHistory,
    ) -> Vec<EnrichedEncounter> {
        let prior: Vec<(NaiveDate, EncounterKey)> = {
            let batch_keys: BTreeSet<&EncounterKey> = partition
                .encounters
                .iter()
                .map(|encounter| &encounter.encounter_key)
                .collect();
            history
                .admissions(&partition.identity_hash)
                .iter()
                .filter(|(_, key)| !batch_keys.contains(key))
                .cloned()
                .collect()
        };

        let mut prior = prior.into_iter().peekable();
        let mut previous_admission: Option<NaiveDate> = None;
        let mut admissions_seen: u32 = 0;

        partition
            .encounters
            .into_iter()
            .map(|encounter| {
                while let Some((date, _)) = prior.next_if(|(date, key)| {
                    (*date, key) < (encounter.admission_date, &encounter.encounter_key)
                }) {
                    previous_admission = Some(date);
                    admissions_seen += 1;
                }

                let days_since_last_admission = previous_admission
                    .map(|previous| (encounter.admission_date - previous).num_days());
                let is_readmission = days_since_last_admission
                    .is_some_and(|gap| gap <= self.readmission_window_days);
                let previous_admission_count = admissions_seen;

                previous_admission = Some(encounter.admission_date);
                admissions_seen += 1;

                enrich(
                    encounter,
                    days_since_last_admission,
                    is_readmission,
                    previous_admission_count,
                )
            })
            .collect()
    }
}

/// Per-record features that need no other encounter
fn enrich(
    encounter: CleanedEncounter,
    days_since_last_admission: Option<i64>,
    is_readmission: bool,
    previous_admission_count: u32,
) -> EnrichedEncounter {
    let length_of_stay = (encounter.discharge_date - encounter.admission_date).num_days();
    let cost_per_day = cost_per_day(encounter.billing_amount, length_of_stay);

    EnrichedEncounter {
        length_of_stay,
        cost_per_day,
        age_group: AgeGroup::from_age(encounter.age),
        season: Season::from_date(encounter.admission_date),
        is_emergency: encounter.admission_type.is_emergency(),
        days_since_last_admission,
        is_readmission,
        previous_admission_count,
        encounter,
    }
}

/// Billing per day of stay; undefined for zero-day stays
pub fn cost_per_day(billing_amount: f64, length_of_stay: i64) -> Option<f64> {
    if length_of_stay <= 0 {
        None
    } else {
        Some(billing_amount / length_of_stay as f64)
    }
}
