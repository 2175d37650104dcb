//! Retry loop engine for eventually-consistent backends
//!
//! A worker is invoked repeatedly until it reports a terminal outcome or the
//! sleeper policy runs out of attempts. Workers classify each observation
//! themselves through [`Outcome`]:
//!
//! - `Outcome::Retry`: not converged yet, sleep and try again
//! - `Outcome::Success(value)`: stop, `value` is the result
//! - `Outcome::Failure(err)`: stop, `err` is returned unchanged
//!
//! A worker error is never retried. Only `Outcome::Retry` leads to another
//! attempt.
//!
//! # Example
//!
//! ```rust,no_run
//! use converge_core::retry::{Outcome, RetryError, RetryLoop, RetryPolicy};
//!
//! async fn example() -> Result<u32, RetryError<std::io::Error>> {
//!     let mut seen = 0;
//!     RetryLoop::new("wait for three items")
//!         .with_sleeper(RetryPolicy::doubling(20, 10))
//!         .run(|| {
//!             seen += 1;
//!             let outcome = if seen < 3 {
//!                 Outcome::Retry
//!             } else {
//!                 Outcome::Success(seen)
//!             };
//!             async move { outcome }
//!         })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod outcome;
mod policy;

pub use error::RetryError;
pub use executor::{retry_loop, RetryLoop};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use outcome::Outcome;
pub use policy::{calculate_delay, RetryPolicy, RetryStrategy, Sleeper};
