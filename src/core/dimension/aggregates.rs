//! Aggregate refresh
//!
//! Dimension aggregates are recomputed from the whole fact table after every
//! merge, never accumulated incrementally. A corrected fact therefore moves
//! exactly the aggregates of the dimension rows it references.

use super::patient::PATIENT_TABLE;
use super::{PatientDimension, ReferenceDimension, ReferenceDimensions};
use crate::core::fact::FactTable;
use crate::domain::dimension::{
    DiagnosisAttributes, FacilityAttributes, InsuranceAttributes, MedicationAttributes,
    ProviderAttributes,
};
use crate::domain::{
    DimensionAttributes, DimensionKind, FactEncounterRow, PatientIdentityHash, PatientLifetime,
    SurrogateKey,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Maximum conditions listed per medication
pub const COMMON_CONDITIONS_LIMIT: usize = 3;

/// Running totals over the fact rows referencing one dimension row
#[derive(Debug, Default)]
struct Tally {
    count: u64,
    billing: f64,
    stay_days: i64,
    age_years: u64,
    max_room: Option<u32>,
    conditions: BTreeMap<String, u64>,
}

impl Tally {
    fn add(&mut self, row: &FactEncounterRow, condition: Option<&String>) {
        self.count += 1;
        self.billing += row.billing_amount;
        self.stay_days += row.length_of_stay;
        self.age_years += u64::from(row.age);
        self.max_room = self.max_room.max(row.room_number);
        if let Some(condition) = condition {
            *self.conditions.entry(condition.clone()).or_default() += 1;
        }
    }

    fn mean(&self, total: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            total / self.count as f64
        }
    }

    fn avg_billing(&self) -> f64 {
        self.mean(self.billing)
    }

    fn avg_stay(&self) -> f64 {
        self.mean(self.stay_days as f64)
    }

    /// Conditions by descending frequency, ties by name
    fn ranked_conditions(&self) -> Vec<String> {
        let mut ranked: Vec<(&String, &u64)> = self.conditions.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        ranked.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Recomputes every dimension's aggregates
///
/// Returns the number of rows whose attributes changed, per table.
pub fn refresh_all(
    reference: &mut ReferenceDimensions,
    patients: &mut PatientDimension,
    facts: &FactTable,
) -> BTreeMap<String, usize> {
    let condition_names: HashMap<SurrogateKey, String> = reference
        .get(DimensionKind::Diagnosis)
        .map(|diagnosis| {
            diagnosis
                .rows()
                .map(|row| (row.surrogate_key, row.natural_key.clone()))
                .collect()
        })
        .unwrap_or_default();

    let (mut refreshed, patient_refreshed): (BTreeMap<String, usize>, usize) = rayon::join(
        || {
            reference
                .iter_mut()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|dimension| {
                    let changed = refresh_reference(dimension, facts, &condition_names);
                    (dimension.kind().table_name(), changed)
                })
                .collect::<BTreeMap<_, _>>()
        },
        || refresh_patients(patients, facts),
    );
    refreshed.insert(PATIENT_TABLE.to_string(), patient_refreshed);

    tracing::debug!(?refreshed, "Dimension aggregates refreshed");
    refreshed
}

/// Recomputes one reference dimension; returns the count of changed rows
pub fn refresh_reference(
    dimension: &mut ReferenceDimension,
    facts: &FactTable,
    condition_names: &HashMap<SurrogateKey, String>,
) -> usize {
    let kind = dimension.kind();
    let mut tallies: HashMap<SurrogateKey, Tally> = HashMap::new();
    for row in facts.rows() {
        let condition = condition_names.get(&row.diagnosis_key);
        tallies.entry(row.key_for(kind)).or_default().add(row, condition);
    }

    let empty = Tally::default();
    let mut changed = 0;
    for row in dimension.rows_mut() {
        let tally = tallies.get(&row.surrogate_key).unwrap_or(&empty);
        let refreshed = refreshed_attributes(&row.attributes, tally);
        if refreshed != row.attributes {
            row.attributes = refreshed;
            changed += 1;
        }
    }
    changed
}

fn refreshed_attributes(current: &DimensionAttributes, tally: &Tally) -> DimensionAttributes {
    match current {
        DimensionAttributes::Date(date) => {
            let mut date = date.clone();
            date.admissions = tally.count;
            date.total_billing = tally.billing;
            DimensionAttributes::Date(date)
        }
        DimensionAttributes::Provider(_) => DimensionAttributes::Provider(ProviderAttributes {
            total_encounters: tally.count,
            avg_billing: tally.avg_billing(),
            avg_length_of_stay: tally.avg_stay(),
            primary_condition: tally.ranked_conditions().into_iter().next(),
        }),
        DimensionAttributes::Facility(_) => DimensionAttributes::Facility(FacilityAttributes {
            total_encounters: tally.count,
            total_revenue: tally.billing,
            avg_billing: tally.avg_billing(),
            avg_length_of_stay: tally.avg_stay(),
            bed_count: tally.max_room,
        }),
        DimensionAttributes::Diagnosis(_) => DimensionAttributes::Diagnosis(DiagnosisAttributes {
            total_cases: tally.count,
            avg_cost: tally.avg_billing(),
            avg_length_of_stay: tally.avg_stay(),
            avg_patient_age: tally.mean(tally.age_years as f64),
        }),
        DimensionAttributes::Medication(_) => {
            let mut common_conditions = tally.ranked_conditions();
            common_conditions.truncate(COMMON_CONDITIONS_LIMIT);
            DimensionAttributes::Medication(MedicationAttributes {
                total_prescriptions: tally.count,
                common_conditions,
            })
        }
        DimensionAttributes::Insurance(_) => DimensionAttributes::Insurance(InsuranceAttributes {
            total_covered: tally.count,
            avg_billing: tally.avg_billing(),
            total_billing: tally.billing,
        }),
    }
}

/// Recomputes lifetime aggregates per patient identity
///
/// Facts referencing any version of an identity count toward it.
pub fn refresh_patients(patients: &mut PatientDimension, facts: &FactTable) -> usize {
    let owners: HashMap<SurrogateKey, PatientIdentityHash> = patients
        .histories()
        .flat_map(|history| {
            history
                .versions()
                .map(|version| (version.patient_key, history.identity_hash().clone()))
                .collect::<Vec<_>>()
        })
        .collect();

    let mut tallies: HashMap<PatientIdentityHash, Tally> = HashMap::new();
    for row in facts.rows() {
        if let Some(identity) = owners.get(&row.patient_key) {
            tallies.entry(identity.clone()).or_default().add(row, None);
        }
    }

    let empty = Tally::default();
    let mut changed = 0;
    for history in patients.histories_mut() {
        let tally = tallies.get(history.identity_hash()).unwrap_or(&empty);
        let lifetime = PatientLifetime {
            total_encounters: tally.count,
            total_billing: tally.billing,
            avg_length_of_stay: tally.avg_stay(),
        };
        if *history.lifetime() != lifetime {
            history.set_lifetime(lifetime);
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dimension::build_all;
    use crate::core::fact::FactLoader;
    use crate::core::temporal::{AdmissionHistory, TemporalAnalyzer};
    use crate::core::testing::{date, encounter};
    use crate::domain::CleanedEncounter;

    fn warehouse(
        records: Vec<CleanedEncounter>,
    ) -> (ReferenceDimensions, PatientDimension, FactTable) {
        let enriched = TemporalAnalyzer::default().analyze(records);
        let built = build_all(
            ReferenceDimensions::empty(),
            PatientDimension::new(),
            &enriched,
            &AdmissionHistory::new(),
            date("2024-12-31"),
        )
        .unwrap();
        let (facts, _) =
            FactLoader::new().merge(FactTable::new(), &enriched, &built.reference, &built.patients);
        (built.reference, built.patients, facts)
    }

    fn attributes(
        reference: &ReferenceDimensions,
        kind: DimensionKind,
        natural_key: &str,
    ) -> DimensionAttributes {
        let dimension = reference.get(kind).unwrap();
        let key = dimension.resolve(natural_key).unwrap();
        dimension.row(key).unwrap().attributes.clone()
    }

    #[test]
    fn test_provider_aggregates() {
        let (mut reference, mut patients, facts) = warehouse(vec![
            encounter("oli", "2024-01-01", "2024-01-03")
                .doctor("Dr Kim")
                .condition("Asthma")
                .amount(100.0)
                .build(),
            encounter("pam", "2024-01-02", "2024-01-06")
                .doctor("Dr Kim")
                .condition("Cancer")
                .amount(300.0)
                .build(),
            encounter("quin", "2024-01-03", "2024-01-04")
                .doctor("Dr Kim")
                .condition("Cancer")
                .amount(200.0)
                .build(),
        ]);

        refresh_all(&mut reference, &mut patients, &facts);

        let DimensionAttributes::Provider(provider) =
            attributes(&reference, DimensionKind::Provider, "Dr Kim")
        else {
            panic!("expected provider attributes");
        };
        assert_eq!(provider.total_encounters, 3);
        assert!((provider.avg_billing - 200.0).abs() < 1e-9);
        assert!((provider.avg_length_of_stay - 7.0 / 3.0).abs() < 1e-9);
        assert_eq!(provider.primary_condition.as_deref(), Some("Cancer"));
    }

    #[test]
    fn test_facility_bed_count_and_revenue() {
        let (mut reference, mut patients, facts) = warehouse(vec![
            encounter("ray", "2024-01-01", "2024-01-02").room(Some(12)).amount(50.0).build(),
            encounter("sal", "2024-01-01", "2024-01-02").room(Some(310)).amount(70.0).build(),
            encounter("tom", "2024-01-01", "2024-01-02").room(None).amount(30.0).build(),
        ]);

        refresh_all(&mut reference, &mut patients, &facts);

        let DimensionAttributes::Facility(facility) =
            attributes(&reference, DimensionKind::Facility, "Mercy General")
        else {
            panic!("expected facility attributes");
        };
        assert_eq!(facility.bed_count, Some(310));
        assert!((facility.total_revenue - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_medication_common_conditions_are_bounded() {
        let records = ["A", "B", "B", "C", "C", "C", "D"]
            .iter()
            .enumerate()
            .map(|(i, condition)| {
                encounter(&format!("patient{i}"), "2024-02-01", "2024-02-02")
                    .condition(condition)
                    .build()
            })
            .collect();
        let (mut reference, mut patients, facts) = warehouse(records);

        refresh_all(&mut reference, &mut patients, &facts);

        let DimensionAttributes::Medication(medication) =
            attributes(&reference, DimensionKind::Medication, "Aspirin")
        else {
            panic!("expected medication attributes");
        };
        assert_eq!(medication.total_prescriptions, 7);
        assert_eq!(medication.common_conditions, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_date_admissions_count_admission_dates_only() {
        let (mut reference, mut patients, facts) = warehouse(vec![
            encounter("uma", "2024-03-01", "2024-03-02").build(),
            encounter("val", "2024-03-01", "2024-03-05").build(),
        ]);

        refresh_all(&mut reference, &mut patients, &facts);

        let DimensionAttributes::Date(admitted) =
            attributes(&reference, DimensionKind::Date, "2024-03-01")
        else {
            panic!("expected date attributes");
        };
        let DimensionAttributes::Date(discharged) =
            attributes(&reference, DimensionKind::Date, "2024-03-05")
        else {
            panic!("expected date attributes");
        };
        assert_eq!(admitted.admissions, 2);
        assert_eq!(discharged.admissions, 0);
    }

    #[test]
    fn test_patient_lifetime_aggregates() {
        let (mut reference, mut patients, facts) = warehouse(vec![
            encounter("wes", "2024-01-01", "2024-01-03").amount(100.0).build(),
            encounter("wes", "2024-02-01", "2024-02-05").amount(250.0).build(),
        ]);

        let refreshed = refresh_all(&mut reference, &mut patients, &facts);

        assert_eq!(refreshed["dim_patient"], 1);
        let row = &patients.rows()[0];
        assert_eq!(row.total_encounters, 2);
        assert!((row.total_billing - 350.0).abs() < 1e-9);
        assert!((row.avg_length_of_stay - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_second_refresh_changes_nothing() {
        let (mut reference, mut patients, facts) =
            warehouse(vec![encounter("xia", "2024-01-01", "2024-01-03").build()]);

        refresh_all(&mut reference, &mut patients, &facts);
        let refreshed = refresh_all(&mut reference, &mut patients, &facts);

        assert!(refreshed.values().all(|changed| *changed == 0));
    }
}
