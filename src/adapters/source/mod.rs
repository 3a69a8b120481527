//! Raw record sources
//!
//! The pipeline itself takes an in-memory batch of [`RawRecord`]s; sources
//! only exist so the CLI can drive a run from a file.
//!
//! [`RawRecord`]: crate::domain::RawRecord

pub mod csv_file;

pub use csv_file::{read_csv, read_csv_file};
