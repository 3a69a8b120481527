//! Type-2 patient dimension models
//!
//! A [`PatientHistory`] owns every version of one patient identity. The
//! current version is a dedicated field rather than a flag, so a history
//! always has exactly one current version. Closed versions carry their end
//! date inside [`VersionState::Historical`].

use super::encounter::AgeGroup;
use super::ids::{PatientIdentityHash, SurrogateKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Demographic attributes tracked for change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSnapshot {
    pub age_group: AgeGroup,
    pub gender: String,
    pub blood_type: String,
}

/// Lifetime aggregates of one patient identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientLifetime {
    pub total_encounters: u64,
    pub total_billing: f64,
    pub avg_length_of_stay: f64,
}

/// Whether a version is the open one or a closed one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VersionState {
    Current,
    Historical { effective_to: NaiveDate },
}

/// One effective-dated version of a patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientVersion {
    pub patient_key: SurrogateKey,
    pub snapshot: PatientSnapshot,
    pub effective_from: NaiveDate,
    pub state: VersionState,
}

impl PatientVersion {
    pub fn is_current(&self) -> bool {
        matches!(self.state, VersionState::Current)
    }

    pub fn effective_to(&self) -> Option<NaiveDate> {
        match self.state {
            VersionState::Current => None,
            VersionState::Historical { effective_to } => Some(effective_to),
        }
    }
}

/// All versions of one patient identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientHistory {
    identity_hash: PatientIdentityHash,
    current: PatientVersion,
    closed: Vec<PatientVersion>,
    #[serde(default)]
    lifetime: PatientLifetime,
}

impl PatientHistory {
    /// Starts a history with its first current version
    pub fn new(
        identity_hash: PatientIdentityHash,
        patient_key: SurrogateKey,
        snapshot: PatientSnapshot,
        effective_from: NaiveDate,
    ) -> Self {
        Self {
            identity_hash,
            current: PatientVersion {
                patient_key,
                snapshot,
                effective_from,
                state: VersionState::Current,
            },
            closed: Vec::new(),
            lifetime: PatientLifetime::default(),
        }
    }

    pub fn identity_hash(&self) -> &PatientIdentityHash {
        &self.identity_hash
    }

    pub fn current(&self) -> &PatientVersion {
        &self.current
    }

    /// Closed versions, oldest first
    pub fn closed(&self) -> &[PatientVersion] {
        &self.closed
    }

    pub fn lifetime(&self) -> &PatientLifetime {
        &self.lifetime
    }

    pub fn set_lifetime(&mut self, lifetime: PatientLifetime) {
        self.lifetime = lifetime;
    }

    /// Every version, oldest first, current last
    pub fn versions(&self) -> impl Iterator<Item = &PatientVersion> {
        self.closed.iter().chain(std::iter::once(&self.current))
    }

    /// Whether any version of this history carries `key`
    pub fn owns_key(&self, key: SurrogateKey) -> bool {
        self.versions().any(|version| version.patient_key == key)
    }

    /// Closes the current version at `as_of` and opens a new one
    ///
    /// # Errors
    ///
    /// Returns an error if `as_of` is not after the current version's start,
    /// since the closed range would be empty or overlap its successor.
    pub fn supersede(
        &mut self,
        patient_key: SurrogateKey,
        snapshot: PatientSnapshot,
        as_of: NaiveDate,
    ) -> Result<(), String> {
        if as_of <= self.current.effective_from {
            return Err(format!(
                "as-of date {as_of} is not after current version start {} for patient {}",
                self.current.effective_from,
                self.identity_hash.short()
            ));
        }

        let next = PatientVersion {
            patient_key,
            snapshot,
            effective_from: as_of,
            state: VersionState::Current,
        };
        let mut previous = std::mem::replace(&mut self.current, next);
        previous.state = VersionState::Historical {
            effective_to: as_of,
        };
        self.closed.push(previous);
        Ok(())
    }

    /// Replaces the current snapshot without opening a new version
    ///
    /// Used for same-day corrections, where the as-of date equals the
    /// current version's start.
    pub fn correct_current(&mut self, snapshot: PatientSnapshot) {
        self.current.snapshot = snapshot;
    }

    /// Flattened rows for consumers and quality checks
    pub fn to_rows(&self) -> Vec<PatientDimensionRow> {
        self.versions()
            .map(|version| PatientDimensionRow {
                patient_key: version.patient_key,
                patient_identity_hash: self.identity_hash.clone(),
                age_group: version.snapshot.age_group,
                gender: version.snapshot.gender.clone(),
                blood_type: version.snapshot.blood_type.clone(),
                effective_from: version.effective_from,
                effective_to: version.effective_to(),
                is_current: version.is_current(),
                total_encounters: self.lifetime.total_encounters,
                total_billing: self.lifetime.total_billing,
                avg_length_of_stay: self.lifetime.avg_length_of_stay,
            })
            .collect()
    }
}

/// Flat patient dimension row, as consumers see it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientDimensionRow {
    pub patient_key: SurrogateKey,
    pub patient_identity_hash: PatientIdentityHash,
    pub age_group: AgeGroup,
    pub gender: String,
    pub blood_type: String,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
    pub is_current: bool,
    pub total_encounters: u64,
    pub total_billing: f64,
    pub avg_length_of_stay: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> PatientIdentityHash {
        PatientIdentityHash::new("c".repeat(64)).unwrap()
    }

    fn snapshot(age_group: AgeGroup) -> PatientSnapshot {
        PatientSnapshot {
            age_group,
            gender: "Female".to_string(),
            blood_type: "O+".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_history_has_single_current_version() {
        let history = PatientHistory::new(
            identity(),
            SurrogateKey::new(1),
            snapshot(AgeGroup::Adult),
            date(2024, 1, 1),
        );

        assert!(history.current().is_current());
        assert!(history.closed().is_empty());
        assert_eq!(history.to_rows().len(), 1);
        assert!(history.to_rows()[0].effective_to.is_none());
    }

    #[test]
    fn test_supersede_closes_previous_version() {
        let mut history = PatientHistory::new(
            identity(),
            SurrogateKey::new(1),
            snapshot(AgeGroup::Adult),
            date(2024, 1, 1),
        );

        history
            .supersede(
                SurrogateKey::new(7),
                snapshot(AgeGroup::MiddleAged),
                date(2024, 6, 1),
            )
            .unwrap();

        assert_eq!(history.current().patient_key, SurrogateKey::new(7));
        assert_eq!(history.closed().len(), 1);
        assert_eq!(history.closed()[0].effective_to(), Some(date(2024, 6, 1)));
        assert!(history.owns_key(SurrogateKey::new(1)));
        assert!(history.owns_key(SurrogateKey::new(7)));

        let rows = history.to_rows();
        assert_eq!(rows.iter().filter(|row| row.is_current).count(), 1);
    }

    #[test]
    fn test_supersede_rejects_non_advancing_as_of() {
        let mut history = PatientHistory::new(
            identity(),
            SurrogateKey::new(1),
            snapshot(AgeGroup::Adult),
            date(2024, 6, 1),
        );

        assert!(history
            .supersede(
                SurrogateKey::new(2),
                snapshot(AgeGroup::Senior),
                date(2024, 6, 1)
            )
            .is_err());
        assert!(history
            .supersede(
                SurrogateKey::new(2),
                snapshot(AgeGroup::Senior),
                date(2024, 5, 1)
            )
            .is_err());
        assert!(history.closed().is_empty());
    }

    #[test]
    fn test_lifetime_is_copied_to_every_row() {
        let mut history = PatientHistory::new(
            identity(),
            SurrogateKey::new(1),
            snapshot(AgeGroup::Adult),
            date(2024, 1, 1),
        );
        history
            .supersede(
                SurrogateKey::new(2),
                snapshot(AgeGroup::MiddleAged),
                date(2024, 3, 1),
            )
            .unwrap();
        history.set_lifetime(PatientLifetime {
            total_encounters: 3,
            total_billing: 900.0,
            avg_length_of_stay: 4.0,
        });

        for row in history.to_rows() {
            assert_eq!(row.total_encounters, 3);
            assert_eq!(row.total_billing, 900.0);
        }
    }
}
