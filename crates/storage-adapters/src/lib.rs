//! crates/storage-adapters/src/lib.rs
//!
//! Implementations of the domain store ports, selected at compile time by
//! feature: `db-memory` (default) and `db-sqlite`.

#[cfg(feature = "db-memory")]
pub mod memory;
pub mod revalidate;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

#[cfg(feature = "db-memory")]
pub use memory::MemoryStore;
pub use revalidate::{RecordingRevalidator, TracingRevalidator};
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
