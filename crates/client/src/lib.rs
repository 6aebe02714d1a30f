//! # PIM SDK Client
//!
//! Async client for Akeneo-style PIM REST APIs.
//!
//! This crate contains:
//! - The request pipeline: transport, token manager, rate limiter, retry
//!   policy and dispatcher
//! - Pagination and bulk execution on top of the dispatcher
//! - The search filter compiler
//! - Typed resource adapters and a blocking facade
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Data types and errors come from `pimsdk-domain`
//! - Rate limiting and backoff come from `pimsdk-common`
//! - Only [`transport`] touches the network; every other component talks to
//!   it through the [`Transport`] trait

pub mod auth;
pub mod blocking;
pub mod bulk;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod observability;
pub mod pagination;
pub mod resources;
pub mod retry;
pub mod search;
pub mod transport;

// Re-export commonly used items
pub use auth::{CredentialExchange, Grant, HttpCredentialExchange, TokenManager};
pub use blocking::{BlockingIter, BlockingPimClient};
pub use bulk::{BulkBatcher, BulkItem, BulkMode};
pub use client::{PimClient, PimClientBuilder};
pub use dispatcher::Dispatcher;
pub use observability::init_tracing;
pub use pagination::PageWalker;
pub use resources::{CategoryMedia, MediaOwner, ProductKey};
pub use retry::{RetryCause, RetryDecision, RetryPolicy, RetryState};
pub use search::{AttributeRef, ClauseContext, Operator, SearchQuery};
pub use transport::{ReqwestTransport, Transport, TransportRequest};

pub use pimsdk_domain::{ClientConfig, PimError, Result};
