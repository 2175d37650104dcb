//! Harness configuration
//!
//! Loaded with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. `converge.yaml` in the config directory (or an explicit file)
//! 3. Environment variables (`CONVERGE_*` prefix)

mod loader;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Top-level harness configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HarnessConfig {
    /// Sleeper policy used by the polling assertions
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Request dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Backing store bootstrap settings
    #[serde(default)]
    pub store: StoreConfig,
}

/// Request dispatch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DispatchConfig {
    /// Synthetic origin prepended to every request path
    #[serde(default = "default_base_origin")]
    pub base_origin: String,

    /// Password used when a worker acts as a named user
    #[serde(default = "default_password")]
    pub default_password: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_origin: default_base_origin(),
            default_password: default_password(),
        }
    }
}

fn default_base_origin() -> String {
    "http://localhost".to_string()
}

fn default_password() -> String {
    "letmein".to_string()
}

/// Backing store bootstrap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Prefix for generated store names
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Database name the store is mounted under
    #[serde(default = "default_database")]
    pub database: String,

    /// Enable the guest user with access to every channel after creation
    #[serde(default = "default_guest_access")]
    pub guest_access: bool,

    /// Let users authenticate with an empty password
    ///
    /// Stores created this way skip the guest access bootstrap.
    #[serde(default)]
    pub allow_empty_password: bool,

    /// Optional sync function source handed to the backend
    #[serde(default)]
    pub sync_function: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            database: default_database(),
            guest_access: default_guest_access(),
            allow_empty_password: false,
            sync_function: None,
        }
    }
}

fn default_name_prefix() -> String {
    "converge_test".to_string()
}

fn default_database() -> String {
    "db".to_string()
}

fn default_guest_access() -> bool {
    true
}
