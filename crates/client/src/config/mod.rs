//! Configuration loading
//!
//! Builds a [`ClientConfig`](pimsdk_domain::ClientConfig) from environment
//! variables or a config file.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, candidate_config_paths};
