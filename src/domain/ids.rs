//! Domain identifier types with validation
//!
//! Newtype wrappers keep encounter keys, identity hashes, surrogate keys and
//! batch identifiers from being mixed up. Hash-backed identifiers are always
//! 64 lowercase hex characters (SHA-256).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

fn validate_digest(kind: &str, value: &str) -> Result<(), String> {
    if value.len() != DIGEST_HEX_LEN {
        return Err(format!(
            "{kind} must be {DIGEST_HEX_LEN} hex characters, got {}",
            value.len()
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(format!("{kind} must be lowercase hex: {value}"));
    }
    Ok(())
}

/// Deterministic key of one encounter
///
/// Derived from the patient identity and the admission date, so the same
/// source row always maps to the same fact row.
///
/// # Examples
///
/// ```
/// use meridian::domain::ids::EncounterKey;
///
/// let key = EncounterKey::new("a".repeat(64)).unwrap();
/// assert_eq!(key.as_str().len(), 64);
/// assert!(EncounterKey::new("not-a-digest").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EncounterKey(String);

impl EncounterKey {
    /// Creates a new EncounterKey from a hex digest
    pub fn new(key: impl Into<String>) -> Result<Self, String> {
        let key = key.into();
        validate_digest("Encounter key", &key)?;
        Ok(Self(key))
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for EncounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EncounterKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EncounterKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One-way hash of a patient's identifying name
///
/// Used as the grouping key for temporal analysis and as the natural key of
/// the patient dimension. The name itself is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientIdentityHash(String);

impl PatientIdentityHash {
    /// Creates a new PatientIdentityHash from a hex digest
    pub fn new(hash: impl Into<String>) -> Result<Self, String> {
        let hash = hash.into();
        validate_digest("Patient identity hash", &hash)?;
        Ok(Self(hash))
    }

    /// Returns the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for PatientIdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatientIdentityHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PatientIdentityHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Pipeline-assigned dimension key
///
/// Keys start at 1 and are never reassigned once handed out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SurrogateKey(u64);

impl SurrogateKey {
    /// First key handed out by an empty registry
    pub const FIRST: SurrogateKey = SurrogateKey(1);

    /// Wraps a raw key value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw key value
    pub fn value(self) -> u64 {
        self.0
    }

    /// The key that follows this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one pipeline run's input batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(String);

impl BatchId {
    /// Creates a new BatchId
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Batch ID cannot be empty".to_string());
        }
        if id.chars().any(char::is_whitespace) {
            return Err(format!("Batch ID cannot contain whitespace: '{id}'"));
        }
        Ok(Self(id))
    }

    /// Returns the batch ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(c: char) -> String {
        std::iter::repeat(c).take(DIGEST_HEX_LEN).collect()
    }

    #[test]
    fn test_encounter_key_creation() {
        let key = EncounterKey::new(digest('b')).unwrap();
        assert_eq!(key.as_str(), digest('b'));
        assert_eq!(key.short(), "bbbbbbbbbbbb");
    }

    #[test]
    fn test_encounter_key_rejects_bad_digest() {
        assert!(EncounterKey::new("").is_err());
        assert!(EncounterKey::new("abc").is_err());
        assert!(EncounterKey::new(digest('G')).is_err());
        assert!(EncounterKey::new(digest('A')).is_err());
    }

    #[test]
    fn test_patient_identity_hash_from_str() {
        let hash: PatientIdentityHash = digest('0').parse().unwrap();
        assert_eq!(format!("{hash}"), digest('0'));
    }

    #[test]
    fn test_surrogate_key_sequence() {
        let first = SurrogateKey::FIRST;
        assert_eq!(first.value(), 1);
        assert_eq!(first.next().value(), 2);
        assert!(first < first.next());
    }

    #[test]
    fn test_surrogate_key_serializes_as_number() {
        let json = serde_json::to_string(&SurrogateKey::new(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_batch_id_validation() {
        assert!(BatchId::new("2024-06-batch-01").is_ok());
        assert!(BatchId::new("").is_err());
        assert!(BatchId::new("  ").is_err());
        assert!(BatchId::new("has space").is_err());
    }
}
