//! Test scenario object
//!
//! A [`RestTester`] owns one backend, the harness configuration and a handle
//! on a store name sequence. Testers that share a backend should share the
//! sequence too, see [`RestTester::with_namer`]. The backing store is created lazily on first use, and
//! every request helper routes through the dispatcher bound to it.

use std::sync::Arc;

use axum::http::Method;
use converge_core::config::HarnessConfig;
use converge_core::retry::{RetryLoop, RetryPolicy, TracingObserver};
use tokio::sync::OnceCell;

use crate::backend::{Backend, StoreNamer, StoreSpec, UserAccess, GUEST_USERNAME};
use crate::dispatch::{Authority, DispatchRequest, DispatchResponse, Dispatcher, Identity};
use crate::error::{Error, Result};
use crate::polling::{
    view_description, ChangesResults, ChangesWorker, ViewResult, ViewWorker, CHANGES_DESCRIPTION,
};

/// Store created by a tester, with the dispatcher bound to its handlers
#[derive(Debug)]
struct ActiveStore {
    spec: StoreSpec,
    dispatcher: Dispatcher,
}

/// Scenario harness for one backend
pub struct RestTester<B: Backend> {
    backend: Arc<B>,
    config: HarnessConfig,
    namer: Arc<StoreNamer>,
    store: OnceCell<ActiveStore>,
}

impl<B: Backend> RestTester<B> {
    /// Create a tester with the default configuration
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, HarnessConfig::default())
    }

    /// Create a tester with an explicit configuration
    pub fn with_config(backend: B, config: HarnessConfig) -> Self {
        Self::from_shared(Arc::new(backend), config)
    }

    /// Create a tester around a backend shared with other testers
    pub fn from_shared(backend: Arc<B>, config: HarnessConfig) -> Self {
        let namer = Arc::new(StoreNamer::new(config.store.name_prefix.clone()));
        Self {
            backend,
            config,
            namer,
            store: OnceCell::new(),
        }
    }

    /// Draw store names from `namer` instead of a private sequence
    ///
    /// Testers built on one shared backend must use one namer so their
    /// stores never collide.
    pub fn with_namer(mut self, namer: Arc<StoreNamer>) -> Self {
        self.namer = namer;
        self
    }

    /// Sequence this tester draws store names from
    pub fn namer(&self) -> &Arc<StoreNamer> {
        &self.namer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Name of the store created by this tester, if it exists yet
    pub fn store_name(&self) -> Option<&str> {
        self.store.get().map(|store| store.spec.name.as_str())
    }

    /// Create the backing store if needed and return its spec
    pub async fn ensure_store(&self) -> Result<&StoreSpec> {
        Ok(&self.active_store().await?.spec)
    }

    /// Dispatcher bound to this tester's store
    pub async fn dispatcher(&self) -> Result<&Dispatcher> {
        Ok(&self.active_store().await?.dispatcher)
    }

    async fn active_store(&self) -> Result<&ActiveStore> {
        self.store.get_or_try_init(|| self.create_store()).await
    }

    async fn create_store(&self) -> Result<ActiveStore> {
        let store_config = &self.config.store;
        let mut spec = StoreSpec::new(self.namer.next_name(), store_config.database.clone())
            .with_allow_empty_password(store_config.allow_empty_password);
        spec.sync_function = store_config.sync_function.clone();

        tracing::info!(
            backend = self.backend.name(),
            store = %spec.name,
            database = %spec.database,
            "creating store"
        );
        self.backend.create_store(&spec).await?;

        if store_config.guest_access && !spec.allow_empty_password {
            self.write_guest_access(&spec.database, true).await?;
        }

        let dispatcher =
            Dispatcher::new(self.backend.admin_handler(), self.backend.public_handler())
                .with_base_origin(self.config.dispatch.base_origin.clone());

        Ok(ActiveStore { spec, dispatcher })
    }

    /// Enable or disable the guest user
    ///
    /// Enabled grants the guest every channel; disabled clears its grants.
    pub async fn set_guest_access(&self, enabled: bool) -> Result<()> {
        let database = self.ensure_store().await?.database.clone();
        self.write_guest_access(&database, enabled).await
    }

    async fn write_guest_access(&self, database: &str, enabled: bool) -> Result<()> {
        let mut guest = self.backend.user_access(database, GUEST_USERNAME).await?;
        let toggled = UserAccess::guest(enabled);
        guest.disabled = toggled.disabled;
        guest.explicit_channels = toggled.explicit_channels;
        self.backend
            .save_user_access(database, GUEST_USERNAME, &guest)
            .await?;

        tracing::debug!(database, enabled, "guest access updated");
        Ok(())
    }

    /// Dispatch a prepared request through `authority`
    pub async fn dispatch(
        &self,
        authority: Authority,
        request: DispatchRequest,
    ) -> Result<DispatchResponse> {
        self.dispatcher().await?.dispatch(authority, request).await
    }

    /// Public request with no identity
    pub async fn send_request(
        &self,
        method: &str,
        resource: &str,
        body: &str,
    ) -> Result<DispatchResponse> {
        let request = build_request(method, resource, body)?;
        self.dispatch(Authority::Public, request).await
    }

    /// Public request with extra headers
    pub async fn send_request_with_headers<I, K, V>(
        &self,
        method: &str,
        resource: &str,
        body: &str,
        headers: I,
    ) -> Result<DispatchResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = build_request(method, resource, body)?.with_headers(headers);
        self.dispatch(Authority::Public, request).await
    }

    /// Public request with extra headers, authenticated as `username`
    pub async fn send_user_request_with_headers<I, K, V>(
        &self,
        method: &str,
        resource: &str,
        body: &str,
        headers: I,
        username: &str,
        password: &str,
    ) -> Result<DispatchResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = build_request(method, resource, body)?
            .with_identity(Identity::new(username, password))
            .with_headers(headers);
        self.dispatch(Authority::Public, request).await
    }

    /// Public request authenticated as `username` with the default password
    pub async fn request_by_user(
        &self,
        method: &str,
        resource: &str,
        body: &str,
        username: &str,
    ) -> Result<DispatchResponse> {
        let request =
            build_request(method, resource, body)?.with_identity(self.identity(username));
        self.dispatch(Authority::Public, request).await
    }

    /// Admin request; no credentials needed
    pub async fn send_admin_request(
        &self,
        method: &str,
        resource: &str,
        body: &str,
    ) -> Result<DispatchResponse> {
        let request = build_request(method, resource, body)?;
        self.dispatch(Authority::Admin, request).await
    }

    /// Admin request with extra headers
    pub async fn send_admin_request_with_headers<I, K, V>(
        &self,
        method: &str,
        resource: &str,
        body: &str,
        headers: I,
    ) -> Result<DispatchResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = build_request(method, resource, body)?.with_headers(headers);
        self.dispatch(Authority::Admin, request).await
    }

    /// Retry loop using the configured sleeper policy
    pub fn retry_loop(
        &self,
        description: impl Into<String>,
    ) -> RetryLoop<RetryPolicy, TracingObserver> {
        RetryLoop::new(description).with_sleeper(self.config.retry.clone())
    }

    /// Worker polling `changes_url` until it lists `expected` entries
    ///
    /// An empty `username` reads the feed as the guest user.
    pub async fn changes_worker(
        &self,
        expected: usize,
        changes_url: &str,
        username: &str,
    ) -> Result<ChangesWorker> {
        let identity = (!username.is_empty()).then(|| self.identity(username));
        let dispatcher = self.dispatcher().await?.clone();
        Ok(ChangesWorker::new(dispatcher, expected, changes_url, identity))
    }

    /// Worker querying `view_path` until it returns `expected` rows
    pub async fn view_worker(&self, expected: usize, view_path: &str) -> Result<ViewWorker> {
        let dispatcher = self.dispatcher().await?.clone();
        Ok(ViewWorker::new(dispatcher, expected, view_path))
    }

    /// Wait until the change feed lists at least `expected` entries
    pub async fn wait_for_changes(
        &self,
        expected: usize,
        changes_url: &str,
        username: &str,
    ) -> Result<ChangesResults> {
        let worker = self.changes_worker(expected, changes_url, username).await?;
        worker.wait(&self.retry_loop(CHANGES_DESCRIPTION)).await
    }

    /// Wait until the view returns at least `expected` rows
    pub async fn wait_for_n_view_results(
        &self,
        expected: usize,
        view_path: &str,
    ) -> Result<ViewResult> {
        let worker = self.view_worker(expected, view_path).await?;
        worker
            .wait(&self.retry_loop(view_description(expected, view_path)))
            .await
    }

    /// Ask the backend to catch up to `seq`
    pub async fn wait_for_sequence(&self, seq: u64) -> Result<()> {
        let database = self.ensure_store().await?.database.clone();
        self.backend.wait_for_sequence(&database, seq).await?;
        Ok(())
    }

    /// Ask the backend to drain pending changes
    pub async fn wait_for_pending_changes(&self) -> Result<()> {
        let database = self.ensure_store().await?.database.clone();
        self.backend.wait_for_pending_changes(&database).await?;
        Ok(())
    }

    /// Reset the store created by this tester, if any
    pub async fn close(self) -> Result<()> {
        if let Some(store) = self.store.into_inner() {
            tracing::info!(store = %store.spec.name, "resetting store");
            self.backend.reset_store(&store.spec).await?;
        }
        Ok(())
    }

    fn identity(&self, username: &str) -> Identity {
        Identity::new(username, self.config.dispatch.default_password.clone())
    }
}

fn build_request(method: &str, resource: &str, body: &str) -> Result<DispatchRequest> {
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|e| Error::invalid_request(method, resource, e.to_string()))?;
    Ok(DispatchRequest::new(method, resource).with_body(body.to_string()))
}
