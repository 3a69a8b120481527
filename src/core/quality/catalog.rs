//! The default check set run after every load

use super::check::{Expectation, QualityCheck, Severity};
use crate::core::dimension::patient::PATIENT_TABLE;
use crate::core::fact::FACT_TABLE;
use crate::domain::fact::FACT_FOREIGN_KEYS;
use crate::domain::DimensionKind;
use serde_json::json;

/// Core fact measures that must always be present
pub const CORE_MEASURES: [&str; 6] = [
    "admission_date",
    "discharge_date",
    "age",
    "billing_amount",
    "length_of_stay",
    "previous_admission_count",
];

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn fact_check(name: &str, severity: Severity, expectation: Expectation) -> QualityCheck {
    QualityCheck {
        name: name.to_string(),
        table: FACT_TABLE.to_string(),
        severity,
        sample_column: "encounter_key".to_string(),
        expectation,
    }
}

/// Builds the default checks
///
/// # Arguments
///
/// * `max_length_of_stay_days` - Upper bound of the length-of-stay range check
pub fn default_checks(max_length_of_stay_days: u32) -> Vec<QualityCheck> {
    let foreign_keys: Vec<&str> = FACT_FOREIGN_KEYS.iter().map(|(column, _)| *column).collect();

    let mut checks = vec![
        fact_check(
            "fact_encounter_key_unique",
            Severity::Fatal,
            Expectation::Unique {
                columns: columns(&["encounter_key"]),
            },
        ),
        fact_check(
            "fact_foreign_keys_not_null",
            Severity::Fatal,
            Expectation::NotNull {
                columns: columns(&foreign_keys),
            },
        ),
        fact_check(
            "fact_core_measures_not_null",
            Severity::Fatal,
            Expectation::NotNull {
                columns: columns(&CORE_MEASURES),
            },
        ),
    ];

    for (column, dimension) in FACT_FOREIGN_KEYS {
        let (target_table, target_column) = match dimension {
            Some(kind) => (kind.table_name(), "surrogate_key"),
            None => (PATIENT_TABLE.to_string(), "patient_key"),
        };
        checks.push(fact_check(
            &format!("fact_{column}_references"),
            Severity::Fatal,
            Expectation::References {
                column: column.to_string(),
                target_table,
                target_column: target_column.to_string(),
            },
        ));
    }

    checks.extend([
        fact_check(
            "fact_length_of_stay_range",
            Severity::Warning,
            Expectation::Range {
                column: "length_of_stay".to_string(),
                min: Some(0.0),
                max: Some(f64::from(max_length_of_stay_days)),
            },
        ),
        fact_check(
            "fact_billing_amount_non_negative",
            Severity::Fatal,
            Expectation::Range {
                column: "billing_amount".to_string(),
                min: Some(0.0),
                max: None,
            },
        ),
        fact_check(
            "fact_discharge_after_admission",
            Severity::Fatal,
            Expectation::ColumnOrder {
                left: "discharge_date".to_string(),
                right: "admission_date".to_string(),
            },
        ),
        fact_check(
            "fact_readmission_has_prior",
            Severity::Fatal,
            Expectation::Implies {
                flag: "is_readmission".to_string(),
                column: "days_since_last_admission".to_string(),
            },
        ),
        fact_check(
            "fact_cost_per_day_null_on_zero_stay",
            Severity::Fatal,
            Expectation::NullWhen {
                column: "cost_per_day".to_string(),
                when_column: "length_of_stay".to_string(),
                equals: json!(0),
            },
        ),
        QualityCheck {
            name: "dim_patient_single_current_version".to_string(),
            table: PATIENT_TABLE.to_string(),
            severity: Severity::Fatal,
            sample_column: "patient_identity_hash".to_string(),
            expectation: Expectation::SingleCurrent {
                group_by: "patient_identity_hash".to_string(),
                flag: "is_current".to_string(),
            },
        },
        QualityCheck {
            name: "dim_patient_versions_non_overlapping".to_string(),
            table: PATIENT_TABLE.to_string(),
            severity: Severity::Fatal,
            sample_column: "patient_key".to_string(),
            expectation: Expectation::NonOverlapping {
                group_by: "patient_identity_hash".to_string(),
                start: "effective_from".to_string(),
                end: "effective_to".to_string(),
            },
        },
    ]);

    for kind in DimensionKind::ALL {
        let table = kind.table_name();
        checks.push(QualityCheck {
            name: format!("{table}_natural_key_unique"),
            table,
            severity: Severity::Warning,
            sample_column: "natural_key".to_string(),
            expectation: Expectation::Unique {
                columns: columns(&["natural_key"]),
            },
        });
    }

    checks
}
