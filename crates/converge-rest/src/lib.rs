//! # converge-rest
//!
//! Test harness for eventually-consistent REST backends:
//! - In-process dispatch to an admin and a public handler entry point
//! - Captured responses with status assertions and typed JSON parsing
//! - Polling assertions for change feeds and view queries, driven by the
//!   `converge-core` retry loop
//! - A scenario object ([`RestTester`]) that bootstraps the backing store
//!   through the [`Backend`] collaborator

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod polling;
pub mod tester;

pub use backend::{Backend, StoreNamer, StoreSpec, UserAccess};
pub use dispatch::{Authority, DispatchRequest, DispatchResponse, Dispatcher, Identity};
pub use error::{Error, Result};
pub use polling::{ChangesResults, ChangesWorker, ViewResult, ViewWorker};
pub use tester::RestTester;
