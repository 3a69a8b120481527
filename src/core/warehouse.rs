//! In-memory warehouse tables and the read-only snapshot handed to consumers

use crate::core::dimension::{PatientDimension, ReferenceDimensions};
use crate::core::fact::FactTable;
use crate::core::temporal::AdmissionHistory;
use crate::domain::{
    DimensionKind, FactEncounterRow, PatientDimensionRow, ReferenceDimensionRow,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Every table the pipeline owns
#[derive(Debug, Clone, PartialEq)]
pub struct Warehouse {
    pub reference: ReferenceDimensions,
    pub patients: PatientDimension,
    pub facts: FactTable,
}

impl Default for Warehouse {
    fn default() -> Self {
        Self {
            reference: ReferenceDimensions::empty(),
            patients: PatientDimension::new(),
            facts: FactTable::new(),
        }
    }
}

impl Warehouse {
    /// Stored admissions grouped by the identity that owns each fact's
    /// patient version
    ///
    /// Facts whose patient key no version carries are left out; the quality
    /// harness reports them as dangling references.
    pub fn admission_history(&self) -> AdmissionHistory {
        let owners = self.patients.key_owners();
        self.facts
            .rows()
            .filter_map(|row| {
                owners.get(&row.patient_key).map(|identity| {
                    (
                        (*identity).clone(),
                        row.admission_date,
                        row.encounter_key.clone(),
                    )
                })
            })
            .collect()
    }

    /// Flattened, read-only copy of every table
    pub fn snapshot(&self) -> WarehouseSnapshot {
        WarehouseSnapshot {
            facts: self.facts.rows().cloned().collect(),
            patients: self.patients.rows(),
            reference: self
                .reference
                .iter()
                .map(|dimension| (dimension.kind(), dimension.rows().cloned().collect()))
                .collect(),
        }
    }
}

/// Read contract for downstream consumers
///
/// A snapshot is detached from the store it was read from; nothing reachable
/// through it can write back.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WarehouseSnapshot {
    facts: Vec<FactEncounterRow>,
    patients: Vec<PatientDimensionRow>,
    reference: BTreeMap<DimensionKind, Vec<ReferenceDimensionRow>>,
}

impl WarehouseSnapshot {
    pub fn facts(&self) -> &[FactEncounterRow] {
        &self.facts
    }

    /// Every patient version row
    pub fn patients(&self) -> &[PatientDimensionRow] {
        &self.patients
    }

    /// Current patient versions only
    pub fn current_patients(&self) -> impl Iterator<Item = &PatientDimensionRow> {
        self.patients.iter().filter(|row| row.is_current)
    }

    pub fn dimension(&self, kind: DimensionKind) -> &[ReferenceDimensionRow] {
        self.reference
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.patients.is_empty()
    }
}
