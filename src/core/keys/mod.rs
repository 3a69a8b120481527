//! Key and privacy engine
//!
//! Computes the deterministic encounter key and the one-way patient identity
//! hash from a normalized record, then drops the identifying name.
//!
//! Both digests are SHA-256 (256 bits, 64 hex characters). Inputs are
//! domain-separated with a leading tag and joined with the ASCII unit
//! separator, so an identity can never be confused with an identity plus
//! date, and the two hash families never produce the same digest for the same
//! name.

use crate::config::SecretString;
use crate::core::normalize::NormalizedRecord;
use crate::domain::{CleanedEncounter, EncounterKey, PatientIdentityHash, Result, WarehouseError};
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};

/// ASCII unit separator between hash input fields
const FIELD_SEPARATOR: u8 = 0x1F;

const ENCOUNTER_DOMAIN: &[u8] = b"encounter";
const PATIENT_DOMAIN: &[u8] = b"patient";

/// Pure, deterministic key derivation
///
/// The optional salt must stay the same across runs; changing it re-keys
/// every encounter and patient.
#[derive(Debug, Clone, Default)]
pub struct KeyEngine {
    salt: Option<SecretString>,
}

impl KeyEngine {
    pub fn new(salt: Option<SecretString>) -> Self {
        Self { salt }
    }

    /// Hash of a normalized identity
    pub fn patient_identity_hash(&self, identity: &str) -> Result<PatientIdentityHash> {
        let digest = self.digest(PATIENT_DOMAIN, &[identity.as_bytes()]);
        PatientIdentityHash::new(digest).map_err(WarehouseError::Other)
    }

    /// Key of one encounter: identity plus admission date
    pub fn encounter_key(&self, identity: &str, admission_date: NaiveDate) -> Result<EncounterKey> {
        let admission = admission_date.format("%Y-%m-%d").to_string();
        let digest = self.digest(
            ENCOUNTER_DOMAIN,
            &[identity.as_bytes(), admission.as_bytes()],
        );
        EncounterKey::new(digest).map_err(WarehouseError::Other)
    }

    /// Keys a normalized record and strips its identity
    ///
    /// Returns the cleaned encounter together with the identity string, which
    /// the caller may use for in-batch collision detection and then drops.
    pub fn key(&self, record: NormalizedRecord) -> Result<(CleanedEncounter, String)> {
        let encounter_key = self.encounter_key(&record.identity, record.admission_date)?;
        let patient_identity_hash = self.patient_identity_hash(&record.identity)?;

        let cleaned = CleanedEncounter {
            encounter_key,
            patient_identity_hash,
            source_row: record.source_row,
            age: record.age,
            gender: record.gender,
            blood_type: record.blood_type,
            medical_condition: record.medical_condition,
            admission_date: record.admission_date,
            discharge_date: record.discharge_date,
            doctor: record.doctor,
            hospital: record.hospital,
            insurance_provider: record.insurance_provider,
            billing_amount: record.billing_amount,
            room_number: record.room_number,
            admission_type: record.admission_type,
            medication: record.medication,
            test_results: record.test_results,
        };

        Ok((cleaned, record.identity))
    }

    fn digest(&self, domain: &[u8], fields: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        hasher.update([FIELD_SEPARATOR]);
        if let Some(salt) = &self.salt {
            hasher.update(salt.expose_secret().as_bytes());
        }
        for field in fields {
            hasher.update([FIELD_SEPARATOR]);
            hasher.update(field);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use crate::core::normalize::Normalizer;
    use crate::domain::RawRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_keys_are_deterministic() {
        let engine = KeyEngine::default();
        let first = engine.encounter_key("tiffany ramirez", date(2022, 11, 18)).unwrap();
        let second = engine.encounter_key("tiffany ramirez", date(2022, 11, 18)).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_encounter_key_depends_on_admission_date() {
        let engine = KeyEngine::default();
        let first = engine.encounter_key("tiffany ramirez", date(2022, 11, 18)).unwrap();
        let second = engine.encounter_key("tiffany ramirez", date(2022, 11, 19)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_families_are_domain_separated() {
        let engine = KeyEngine::default();
        let identity = engine.patient_identity_hash("tiffany ramirez").unwrap();
        let encounter = engine.encounter_key("tiffany ramirez", date(2022, 11, 18)).unwrap();
        assert_ne!(identity.as_str(), encounter.as_str());
    }

    #[test]
    fn test_salt_changes_every_digest() {
        let plain = KeyEngine::default();
        let salted = KeyEngine::new(Some(secret_string("s3cret".to_string())));

        assert_ne!(
            plain.patient_identity_hash("kim").unwrap(),
            salted.patient_identity_hash("kim").unwrap()
        );
        assert_eq!(
            salted.patient_identity_hash("kim").unwrap(),
            KeyEngine::new(Some(secret_string("s3cret".to_string())))
                .patient_identity_hash("kim")
                .unwrap()
        );
    }

    #[test]
    fn test_key_strips_identity_from_encounter() {
        let raw = RawRecord::builder()
            .name("Leslie TERRY")
            .age("35")
            .gender("Male")
            .blood_type("A+")
            .medical_condition("Obesity")
            .date_of_admission("2019-08-20")
            .doctor("Samantha Davies")
            .hospital("Kim Inc")
            .insurance_provider("Medicare")
            .billing_amount("33643.32")
            .room_number("265")
            .admission_type("Emergency")
            .discharge_date("2019-08-26")
            .medication("Ibuprofen")
            .test_results("Inconclusive")
            .build();
        let normalized = Normalizer::default().normalize(1, &raw).unwrap();

        let engine = KeyEngine::default();
        let (cleaned, identity) = engine.key(normalized).unwrap();

        assert_eq!(identity, "leslie terry");
        assert_eq!(
            cleaned.patient_identity_hash,
            engine.patient_identity_hash("leslie terry").unwrap()
        );
        let json = serde_json::to_string(&cleaned).unwrap();
        assert!(!json.to_lowercase().contains("leslie"));
    }
}
