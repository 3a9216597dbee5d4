//! crates/services/src/lib.rs
//!
//! Application logic over the domain ports: the thread tree service and the
//! reference population it builds its projections with.

mod populate;
pub mod thread_tree;

pub use thread_tree::{ServiceOptions, ThreadTreeService};
