//! Warehouse storage layer
//!
//! This module provides a trait-based abstraction over where the warehouse
//! tables live between runs, allowing Meridian to work with different
//! backends (JSON files, in-memory).

pub mod factory;
pub mod json;
pub mod memory;
pub mod traits;

pub use factory::create_store;
pub use json::JsonFileStore;
pub use memory::InMemoryStore;
pub use traits::WarehouseStore;

use crate::core::dimension::ReferenceDimensions;
use crate::core::warehouse::{Warehouse, WarehouseSnapshot};
use crate::domain::{DimensionKind, Result};
use futures::future::try_join_all;

/// Load every table from a store
///
/// # Errors
///
/// Returns an error if any table cannot be read.
pub async fn load_warehouse(store: &dyn WarehouseStore) -> Result<Warehouse> {
    let dimensions = try_join_all(
        DimensionKind::ALL
            .into_iter()
            .map(|kind| store.load_reference_dimension(kind)),
    );
    let (dimensions, patients, facts) = futures::try_join!(
        dimensions,
        store.load_patient_dimension(),
        store.load_fact_table()
    )?;

    Ok(Warehouse {
        reference: ReferenceDimensions::from_dimensions(dimensions),
        patients,
        facts,
    })
}

/// Read-only view of the stored tables for downstream consumers
///
/// # Errors
///
/// Returns an error if any table cannot be read.
pub async fn load_snapshot(store: &dyn WarehouseStore) -> Result<WarehouseSnapshot> {
    Ok(load_warehouse(store).await?.snapshot())
}
