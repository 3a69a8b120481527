//! External system integrations for Meridian.
//!
//! - [`storage`] - Where the warehouse tables live between runs (trait-based)
//! - [`source`] - Raw record input for the CLI
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations:
//!
//! ```rust,no_run
//! use meridian::adapters::storage::{load_snapshot, JsonFileStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonFileStore::new("./warehouse");
//! let snapshot = load_snapshot(&store).await?;
//! println!("{} fact rows", snapshot.facts().len());
//! # Ok(())
//! # }
//! ```

pub mod source;
pub mod storage;
