//! # PIM SDK Domain
//!
//! Transport-level data model shared by every PIM SDK crate.
//!
//! This crate contains:
//! - The error taxonomy (`PimError`) and `Result` alias
//! - Client configuration (`ClientConfig`)
//! - Request descriptors, attempt outcomes, pages, bulk results, credentials
//! - Wire-level constants (endpoint paths, defaults)
//!
//! ## Architecture
//! - No dependencies on other PIM SDK crates
//! - No I/O; pure data structures and their invariants

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
