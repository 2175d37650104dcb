//! # converge-core
//!
//! Core library for the converge polling harness providing:
//! - Sleeper policies (backoff schedule and attempt budget)
//! - The three-outcome worker contract
//! - Retry loop engine with observers, cancellation and deadlines
//! - Layered harness configuration (defaults, YAML file, environment)
//! - Tracing bootstrap for tests and tools

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use config::{ConfigLoader, HarnessConfig};
pub use error::{Error, Result};
pub use retry::{retry_loop, Outcome, RetryError, RetryLoop, RetryPolicy, Sleeper};
