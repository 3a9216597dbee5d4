//! crates/domains/src/lib.rs
//!
//! Entities, ports and errors shared by the thread tree service and its
//! storage adapters.

pub mod error;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
