//! Run orchestration
//!
//! [`PipelineCoordinator::execute_run`] is the single entry point that turns
//! a batch of raw records into merged warehouse tables and a [`RunReport`].

pub mod coordinator;
pub mod ingest;
pub mod report;

pub use coordinator::PipelineCoordinator;
pub use ingest::{DuplicateKeyCollision, IngestOutcome, Rejection};
pub use report::RunReport;
