//! Normalization, keying and in-batch deduplication

use crate::core::keys::KeyEngine;
use crate::core::normalize::Normalizer;
use crate::domain::{CleanedEncounter, EncounterKey, MalformedInput, RawRecord, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// A source row the normalizer refused
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// 1-based input row
    pub source_row: usize,
    pub error: MalformedInput,
}

impl Rejection {
    pub fn field(&self) -> &'static str {
        self.error.field()
    }
}

/// Two different identities produced the same encounter key
///
/// The first row keeps the key; the later one is held back for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKeyCollision {
    pub encounter_key: EncounterKey,
    pub kept_row: usize,
    pub held_back_row: usize,
}

/// Output of the ingest stage
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Unique encounters, in source order
    pub encounters: Vec<CleanedEncounter>,
    pub rejections: Vec<Rejection>,
    /// Exact repeats of an earlier row (same identity and admission date)
    pub duplicates_skipped: usize,
    pub collisions: Vec<DuplicateKeyCollision>,
}

/// Normalizes and keys every record, then drops in-batch duplicates
///
/// Records are processed in parallel on the current rayon pool; the outcome
/// keeps source order, so the first occurrence of a key always wins. Identity
/// strings are used for collision detection and dropped before returning.
///
/// # Errors
///
/// Returns an error only if a computed digest is not a valid key, which
/// indicates a bug rather than bad input.
pub fn ingest(
    records: &[RawRecord],
    normalizer: &Normalizer,
    keys: &KeyEngine,
) -> Result<IngestOutcome> {
    let keyed: Vec<Keyed> = records
        .par_iter()
        .enumerate()
        .map(|(index, raw)| {
            let source_row = index + 1;
            match normalizer.normalize(source_row, raw) {
                Ok(normalized) => keys.key(normalized).map(Ok),
                Err(error) => Ok(Err(Rejection { source_row, error })),
            }
        })
        .collect::<Result<_>>()?;

    let outcome = deduplicate(keyed);

    tracing::debug!(
        received = records.len(),
        cleaned = outcome.encounters.len(),
        rejected = outcome.rejections.len(),
        duplicates = outcome.duplicates_skipped,
        "Ingest complete"
    );

    Ok(outcome)
}

type Keyed = std::result::Result<(CleanedEncounter, String), Rejection>;

/// Splits keyed rows into unique encounters, rejections and duplicates
///
/// Input must be in source order.
fn deduplicate(keyed: Vec<Keyed>) -> IngestOutcome {
    let mut outcome = IngestOutcome::default();
    let mut seen: HashMap<EncounterKey, (String, usize)> = HashMap::with_capacity(keyed.len());

    for result in keyed {
        let (encounter, identity) = match result {
            Ok(keyed) => keyed,
            Err(rejection) => {
                tracing::debug!(
                    source_row = rejection.source_row,
                    field = rejection.field(),
                    "Rejected malformed record"
                );
                outcome.rejections.push(rejection);
                continue;
            }
        };

        match seen.get(&encounter.encounter_key) {
            Some((seen_identity, _)) if *seen_identity == identity => {
                outcome.duplicates_skipped += 1;
            }
            Some((_, kept_row)) => {
                tracing::warn!(
                    encounter_key = encounter.encounter_key.short(),
                    kept_row = *kept_row,
                    held_back_row = encounter.source_row,
                    "Encounter key collision between distinct identities"
                );
                outcome.collisions.push(DuplicateKeyCollision {
                    encounter_key: encounter.encounter_key.clone(),
                    kept_row: *kept_row,
                    held_back_row: encounter.source_row,
                });
            }
            None => {
                seen.insert(
                    encounter.encounter_key.clone(),
                    (identity, encounter.source_row),
                );
                outcome.encounters.push(encounter);
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::encounter;

    fn raw(name: &str, admitted: &str) -> RawRecord {
        RawRecord::builder()
            .name(name)
            .age("52")
            .gender("female")
            .blood_type("a+")
            .medical_condition("asthma")
            .date_of_admission(admitted)
            .doctor("jo park")
            .hospital("mercy general")
            .insurance_provider("aetna")
            .billing_amount("1200.50")
            .room_number("12")
            .admission_type("elective")
            .discharge_date("2024-12-31")
            .medication("ibuprofen")
            .test_results("normal")
            .build()
    }

    #[test]
    fn test_rejections_keep_source_rows() {
        let records = vec![
            raw("Ann Lee", "2024-03-01"),
            raw("Ann Lee", "2024-13-01"),
            raw("Bo Chan", "2024-03-02"),
        ];

        let outcome = ingest(&records, &Normalizer::default(), &KeyEngine::default()).unwrap();

        assert_eq!(outcome.encounters.len(), 2);
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].source_row, 2);
        assert_eq!(outcome.rejections[0].field(), "date_of_admission");
        assert_eq!(outcome.encounters[1].source_row, 3);
    }

    #[test]
    fn test_true_duplicates_are_skipped() {
        // Case and spacing differences normalize to the same identity
        let records = vec![
            raw("Ann Lee", "2024-03-01"),
            raw("  ANN   lee ", "2024-03-01"),
        ];

        let outcome = ingest(&records, &Normalizer::default(), &KeyEngine::default()).unwrap();

        assert_eq!(outcome.encounters.len(), 1);
        assert_eq!(outcome.encounters[0].source_row, 1);
        assert_eq!(outcome.duplicates_skipped, 1);
        assert!(outcome.collisions.is_empty());
    }

    #[test]
    fn test_collision_holds_back_later_identity() {
        let kept = encounter("ann lee", "2024-03-01", "2024-03-02").build();
        let mut clash = encounter("bo chan", "2024-03-01", "2024-03-02").build();
        clash.encounter_key = kept.encounter_key.clone();
        clash.source_row = 4;

        let outcome = deduplicate(vec![
            Ok((kept.clone(), "ann lee".to_string())),
            Ok((clash, "bo chan".to_string())),
        ]);

        assert_eq!(outcome.encounters, vec![kept.clone()]);
        assert_eq!(
            outcome.collisions,
            vec![DuplicateKeyCollision {
                encounter_key: kept.encounter_key,
                kept_row: 1,
                held_back_row: 4,
            }]
        );
        assert_eq!(outcome.duplicates_skipped, 0);
    }

    #[test]
    fn test_keys_are_deterministic_across_runs() {
        let records: Vec<_> = (1..=20)
            .map(|day| raw(&format!("Patient {day}"), &format!("2024-05-{day:02}")))
            .collect();

        let first = ingest(&records, &Normalizer::default(), &KeyEngine::default()).unwrap();
        let second = ingest(&records, &Normalizer::default(), &KeyEngine::default()).unwrap();

        let keys = |outcome: &IngestOutcome| -> Vec<EncounterKey> {
            outcome
                .encounters
                .iter()
                .map(|e| e.encounter_key.clone())
                .collect()
        };
        assert_eq!(keys(&first), keys(&second));
    }
}
