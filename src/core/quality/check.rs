//! Declarative quality checks
//!
//! A check names a table, a severity and an [`Expectation`]. Expectations are
//! evaluated over JSON projections of rows, which keeps missing and null
//! columns observable regardless of how the typed rows are defined.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// JSON rows per table name
pub type TableRows = BTreeMap<String, Vec<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Violations fail the run
    Fatal,
    /// Violations are reported only
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// What a check expects of a table's rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// The combination of `columns` is unique
    Unique { columns: Vec<String> },
    /// None of `columns` is missing or null
    NotNull { columns: Vec<String> },
    /// Non-null `column` values exist in `target_table.target_column`
    References {
        column: String,
        target_table: String,
        target_column: String,
    },
    /// Non-null numeric `column` lies within the inclusive bounds
    Range {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// `left >= right` whenever both are present
    ColumnOrder { left: String, right: String },
    /// When boolean `flag` is true, `column` is not null
    Implies { flag: String, column: String },
    /// `column` is null exactly when `when_column` equals `equals`
    NullWhen {
        column: String,
        when_column: String,
        equals: Value,
    },
    /// Every `group_by` value has exactly one row with `flag` true
    SingleCurrent { group_by: String, flag: String },
    /// Within a `group_by` value, `[start, end)` ranges never overlap; a null
    /// end is open-ended
    NonOverlapping {
        group_by: String,
        start: String,
        end: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub name: String,
    pub table: String,
    pub severity: Severity,
    /// Column reported in samples of violating rows
    pub sample_column: String,
    pub expectation: Expectation,
}

/// Raw outcome of evaluating one expectation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Violations {
    pub count: usize,
    pub sample_keys: Vec<String>,
}

impl Violations {
    fn record(&mut self, key: String, sample_size: usize) {
        self.count += 1;
        if self.sample_keys.len() < sample_size {
            self.sample_keys.push(key);
        }
    }
}

/// A column value, treating missing and null alike
pub fn column<'a>(row: &'a Value, name: &str) -> Option<&'a Value> {
    row.get(name).filter(|value| !value.is_null())
}

/// Text form of a value for samples and grouping
pub fn render(value: Option<&Value>) -> String {
    match value {
        None => "null".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Orders two values of the same JSON type
///
/// Numbers compare numerically and strings lexically, which orders ISO
/// dates correctly.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl QualityCheck {
    /// Evaluates the check against `tables`
    ///
    /// A table absent from `tables` has no rows.
    pub fn evaluate(&self, tables: &TableRows, sample_size: usize) -> Violations {
        let rows = tables.get(&self.table).map(Vec::as_slice).unwrap_or_default();
        let sample_key = |row: &Value| render(column(row, &self.sample_column));
        let mut violations = Violations::default();

        match &self.expectation {
            Expectation::Unique { columns } => {
                let mut seen = HashSet::new();
                for row in rows {
                    let key: Vec<String> =
                        columns.iter().map(|c| render(column(row, c))).collect();
                    if !seen.insert(key) {
                        violations.record(sample_key(row), sample_size);
                    }
                }
            }
            Expectation::NotNull { columns } => {
                for row in rows {
                    if columns.iter().any(|c| column(row, c).is_none()) {
                        violations.record(sample_key(row), sample_size);
                    }
                }
            }
            Expectation::References {
                column: name,
                target_table,
                target_column,
            } => {
                let targets: HashSet<String> = tables
                    .get(target_table)
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|target| column(target, target_column))
                    .map(|value| render(Some(value)))
                    .collect();
                for row in rows {
                    if let Some(value) = column(row, name) {
                        if !targets.contains(&render(Some(value))) {
                            violations.record(sample_key(row), sample_size);
                        }
                    }
                }
            }
            Expectation::Range {
                column: name,
                min,
                max,
            } => {
                for row in rows {
                    let Some(value) = column(row, name) else {
                        continue;
                    };
                    let in_range = value.as_f64().is_some_and(|number| {
                        min.map_or(true, |min| number >= min)
                            && max.map_or(true, |max| number <= max)
                    });
                    if !in_range {
                        violations.record(sample_key(row), sample_size);
                    }
                }
            }
            Expectation::ColumnOrder { left, right } => {
                for row in rows {
                    if let (Some(l), Some(r)) = (column(row, left), column(row, right)) {
                        if !matches!(compare(l, r), Some(Ordering::Greater | Ordering::Equal)) {
                            violations.record(sample_key(row), sample_size);
                        }
                    }
                }
            }
            Expectation::Implies { flag, column: name } => {
                for row in rows {
                    let flagged = column(row, flag).and_then(Value::as_bool) == Some(true);
                    if flagged && column(row, name).is_none() {
                        violations.record(sample_key(row), sample_size);
                    }
                }
            }
            Expectation::NullWhen {
                column: name,
                when_column,
                equals,
            } => {
                for row in rows {
                    let condition = column(row, when_column)
                        .is_some_and(|value| compare(value, equals) == Some(Ordering::Equal));
                    let is_null = column(row, name).is_none();
                    if condition != is_null {
                        violations.record(sample_key(row), sample_size);
                    }
                }
            }
            Expectation::SingleCurrent { group_by, flag } => {
                let mut current_counts: BTreeMap<String, usize> = BTreeMap::new();
                for row in rows {
                    let count = current_counts
                        .entry(render(column(row, group_by)))
                        .or_default();
                    if column(row, flag).and_then(Value::as_bool) == Some(true) {
                        *count += 1;
                    }
                }
                for (group, count) in current_counts {
                    if count != 1 {
                        violations.record(group, sample_size);
                    }
                }
            }
            Expectation::NonOverlapping {
                group_by,
                start,
                end,
            } => {
                let mut groups: HashMap<String, Vec<&Value>> = HashMap::new();
                for row in rows {
                    groups
                        .entry(render(column(row, group_by)))
                        .or_default()
                        .push(row);
                }
                let mut group_names: Vec<_> = groups.keys().cloned().collect();
                group_names.sort();

                for group in group_names {
                    let Some(members) = groups.get_mut(&group) else {
                        continue;
                    };
                    members.sort_by(|a, b| {
                        match (column(a, start), column(b, start)) {
                            (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
                            _ => Ordering::Equal,
                        }
                    });
                    for pair in members.windows(2) {
                        let overlaps = match (column(pair[0], end), column(pair[1], start)) {
                            // an open-ended range followed by anything overlaps
                            (None, _) => true,
                            (Some(previous_end), Some(next_start)) => {
                                compare(previous_end, next_start) == Some(Ordering::Greater)
                            }
                            (Some(_), None) => true,
                        };
                        if overlaps {
                            violations.record(sample_key(pair[1]), sample_size);
                        }
                    }
                }
            }
        }

        violations
    }
}
