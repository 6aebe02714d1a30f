//! Runtime building blocks shared across PIM SDK crates.
//!
//! Everything here is generic over the remote API: a rolling-window rate
//! limiter and exponential backoff with jitter. The client crate composes
//! them into its request pipeline.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod resilience;

pub use resilience::{
    saturating_millis, Backoff, Jitter, RateLimiter, RateLimiterConfig, ResilienceError,
    ResilienceResult,
};
