// Warehouse persistence and run history

pub mod manager;
pub mod run;

pub use manager::StateManager;
pub use run::{RunRecord, RunRecordBuilder, RunStatus};
