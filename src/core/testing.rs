//! Fixture builders shared by the stage unit tests

use crate::core::keys::KeyEngine;
use crate::domain::{AdmissionType, CleanedEncounter};
use chrono::NaiveDate;

pub(crate) fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

/// Starts a cleaned encounter for `name` with plausible defaults
pub(crate) fn encounter(name: &str, admitted: &str, discharged: &str) -> EncounterBuilder {
    let engine = KeyEngine::default();
    let admission_date = date(admitted);
    EncounterBuilder {
        encounter: CleanedEncounter {
            encounter_key: engine.encounter_key(name, admission_date).unwrap(),
            patient_identity_hash: engine.patient_identity_hash(name).unwrap(),
            source_row: 1,
            age: 40,
            gender: "Female".to_string(),
            blood_type: "O+".to_string(),
            medical_condition: "Diabetes".to_string(),
            admission_date,
            discharge_date: date(discharged),
            doctor: "Alex Morgan".to_string(),
            hospital: "Mercy General".to_string(),
            insurance_provider: "Aetna".to_string(),
            billing_amount: 1000.0,
            room_number: Some(101),
            admission_type: AdmissionType::Elective,
            medication: "Aspirin".to_string(),
            test_results: "Normal".to_string(),
        },
    }
}

pub(crate) struct EncounterBuilder {
    encounter: CleanedEncounter,
}

impl EncounterBuilder {
    pub fn age(mut self, age: u32) -> Self {
        self.encounter.age = age;
        self
    }

    pub fn gender(mut self, gender: &str) -> Self {
        self.encounter.gender = gender.to_string();
        self
    }

    pub fn condition(mut self, condition: &str) -> Self {
        self.encounter.medical_condition = condition.to_string();
        self
    }

    pub fn doctor(mut self, doctor: &str) -> Self {
        self.encounter.doctor = doctor.to_string();
        self
    }

    pub fn hospital(mut self, hospital: &str) -> Self {
        self.encounter.hospital = hospital.to_string();
        self
    }

    pub fn medication(mut self, medication: &str) -> Self {
        self.encounter.medication = medication.to_string();
        self
    }

    pub fn amount(mut self, amount: f64) -> Self {
        self.encounter.billing_amount = amount;
        self
    }

    pub fn room(mut self, room: Option<u32>) -> Self {
        self.encounter.room_number = room;
        self
    }

    pub fn build(self) -> CleanedEncounter {
        self.encounter
    }
}
