//! Common test helpers for converge-rest integration tests
//!
//! - An in-memory feed backend served through axum routers
//! - Harness configuration with a fast sleeper policy
//! - Assertion helpers for dispatch results

#![allow(dead_code)]

pub mod backend;

pub use backend::*;

use converge_core::config::HarnessConfig;
use converge_core::logging::init_tracing;
use converge_core::retry::RetryPolicy;
use converge_rest::{DispatchResponse, RestTester};

/// Password of every user created through [`create_user`]
pub const PASSWORD: &str = "letmein";

/// Harness configuration with a millisecond-scale doubling policy
pub fn fast_config(max_attempts: u32) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.retry = RetryPolicy::doubling(1, max_attempts).with_max_delay_ms(4);
    config
}

/// Tester over a fresh feed backend
pub fn tester(max_attempts: u32) -> RestTester<FeedBackend> {
    init_tracing(1, false);
    RestTester::with_config(FeedBackend::new(), fast_config(max_attempts))
}

/// Create a user through the admin surface
pub async fn create_user(rt: &RestTester<FeedBackend>, username: &str, channels: &[&str]) {
    let body = serde_json::json!({ "password": PASSWORD, "admin_channels": channels });
    rt.send_admin_request("PUT", &format!("/db/_user/{}", username), &body.to_string())
        .await
        .unwrap()
        .assert_status(201)
        .unwrap();
}

/// Write a document through the admin surface
pub async fn put_doc(rt: &RestTester<FeedBackend>, docid: &str, channels: &[&str]) {
    let body = serde_json::json!({ "channels": channels });
    rt.send_admin_request("PUT", &format!("/db/{}", docid), &body.to_string())
        .await
        .unwrap()
        .assert_status(201)
        .unwrap();
}

/// Assert the response status, printing the body on mismatch
pub fn assert_status(response: &DispatchResponse, expected: u16) {
    if let Err(err) = response.assert_status(expected) {
        panic!("{}", err);
    }
}
