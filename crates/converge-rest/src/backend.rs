//! Backend collaborator trait definitions
//!
//! The harness treats the system under test as opaque: it only needs the two
//! handler entry points, store bootstrap, and access to a user's
//! channel-authorization state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};

/// Username of the guest (anonymous) user
pub const GUEST_USERNAME: &str = "";

/// Channel granting access to every document
pub const ALL_CHANNELS: &str = "*";

/// An eventually-consistent REST backend under test
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &'static str;

    /// Handler entry point for the administrative surface
    fn admin_handler(&self) -> Router;

    /// Handler entry point for the public surface
    fn public_handler(&self) -> Router;

    /// Create (or obtain) the backing store described by `spec`
    async fn create_store(&self, spec: &StoreSpec) -> Result<()>;

    /// Flush and release a store created by [`create_store`](Self::create_store)
    async fn reset_store(&self, spec: &StoreSpec) -> Result<()>;

    /// Read a user's channel-authorization state
    async fn user_access(&self, database: &str, username: &str) -> Result<UserAccess>;

    /// Persist a user's channel-authorization state
    async fn save_user_access(
        &self,
        database: &str,
        username: &str,
        access: &UserAccess,
    ) -> Result<()>;

    /// Block until the database has caught up to `seq`
    async fn wait_for_sequence(&self, _database: &str, _seq: u64) -> Result<()> {
        Ok(())
    }

    /// Block until every pending change has been processed
    async fn wait_for_pending_changes(&self, _database: &str) -> Result<()> {
        Ok(())
    }
}

/// Parameters for creating a backing store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreSpec {
    /// Generated store (bucket) name, unique per harness instance
    pub name: String,
    /// Database name the store is mounted under
    pub database: String,
    /// Optional sync function source
    pub sync_function: Option<String>,
    /// Accept empty passwords on the public surface
    pub allow_empty_password: bool,
}

impl StoreSpec {
    /// Create a spec with no sync function and password checks enabled
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            sync_function: None,
            allow_empty_password: false,
        }
    }

    /// Set the sync function source
    pub fn with_sync_function(mut self, source: impl Into<String>) -> Self {
        self.sync_function = Some(source.into());
        self
    }

    /// Accept empty passwords
    pub fn with_allow_empty_password(mut self, allow: bool) -> Self {
        self.allow_empty_password = allow;
        self
    }
}

/// A user's channel-authorization state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAccess {
    /// Whether the user is disabled
    #[serde(default)]
    pub disabled: bool,
    /// Explicitly granted channels, with the sequence they were granted at
    #[serde(default)]
    pub explicit_channels: BTreeMap<String, u64>,
}

impl UserAccess {
    /// Guest access state for the given toggle
    ///
    /// Enabled means the guest is active and sees every channel from
    /// sequence 1; disabled clears the explicit channels.
    pub fn guest(enabled: bool) -> Self {
        let mut explicit_channels = BTreeMap::new();
        if enabled {
            explicit_channels.insert(ALL_CHANNELS.to_string(), 1);
        }
        Self {
            disabled: !enabled,
            explicit_channels,
        }
    }

    /// Whether the user can see `channel`
    pub fn can_see(&self, channel: &str) -> bool {
        !self.disabled
            && (self.explicit_channels.contains_key(ALL_CHANNELS)
                || self.explicit_channels.contains_key(channel))
    }
}

/// Generates store names from one sequence
///
/// Share a namer (behind an `Arc`) between every tester that uses the same
/// backend; each call hands out a fresh `<prefix>_<n>`.
#[derive(Debug)]
pub struct StoreNamer {
    prefix: String,
    counter: AtomicU64,
}

impl StoreNamer {
    /// Create a namer starting at 0
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Next name in the sequence: `<prefix>_<n>`
    pub fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.prefix, n)
    }

    /// Number of names handed out so far
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}
