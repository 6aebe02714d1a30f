//! Bearer credential lifecycle
//!
//! - [`CredentialExchange`]: one exchange against the token endpoint
//! - [`TokenManager`]: caching, expiry buffer, single-flight refresh

pub mod exchange;
pub mod token_manager;

pub use exchange::{CredentialExchange, Grant, HttpCredentialExchange};
pub use token_manager::TokenManager;
