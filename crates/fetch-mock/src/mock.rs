//! Mock instances.
//!
//! A [`FetchMock`] owns an ordered handler pipeline and a base URL. It has no
//! effect until [`FetchMock::install`] places it at the head of its
//! [`FetchSlot`]; several mocks can be stacked and destroyed in any order.

use std::future::Future;
use std::sync::{Arc, Mutex};

use reqwest::Url;

use crate::config::{DEFAULT_BASE_URL, MockConfig};
use crate::error::{Error, Result};
use crate::handler::{Handler, IntoOutcome, PathMatcher, Pipeline, Route};
use crate::intercept::{self, InterceptCloser, Interceptor};
use crate::lock;
use crate::request::{FetchTarget, Request, RequestInit};
use crate::response::Response;
use crate::slot::{FetchSlot, Forward, MockId};

/// State of a mock shared with the chain it is installed in.
pub(crate) struct MockCore {
    id: MockId,
    base_url: Url,
    pipeline: Mutex<Pipeline>,
    interceptors: Mutex<Vec<InterceptCloser>>,
}

impl MockCore {
    pub(crate) fn id(&self) -> MockId {
        self.id
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Snapshot of the handlers; later registrations do not affect it.
    pub(crate) fn pipeline(&self) -> Pipeline {
        lock(&self.pipeline).clone()
    }

    fn push(&self, handler: Arc<dyn Handler>) {
        lock(&self.pipeline).push(handler);
    }

    /// Close every interceptor, even those still referenced by in-flight
    /// pipeline snapshots.
    fn close_interceptors(&self) {
        for closer in lock(&self.interceptors).drain(..) {
            closer.close();
        }
    }
}

/// A programmable replacement for fetch.
///
/// # Example
///
/// ```no_run
/// use fetch_mock::{FetchMock, response};
///
/// # async fn example() -> fetch_mock::Result<()> {
/// let mock = FetchMock::with_base_url("https://api.example.com/")?;
/// mock.on("GET", "/users", |_req, _fwd| async { response::json_ok(&["alice"]) })
///     .handle(|_req, _fwd| async { 503 });
/// mock.install()?;
///
/// let users = fetch_mock::fetch("/users").await?;
/// assert_eq!(users.status(), 200);
///
/// mock.destroy();
/// # Ok(())
/// # }
/// ```
pub struct FetchMock {
    core: Arc<MockCore>,
    slot: Arc<FetchSlot>,
}

impl FetchMock {
    /// Create a detached mock for the global slot with the default base URL.
    pub fn new() -> Self {
        Self::build(FetchSlot::global(), default_base_url())
    }

    /// Create a detached mock for the global slot.
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::on_slot(FetchSlot::global(), base_url)
    }

    /// Create a detached mock for the global slot from configuration.
    pub fn from_config(config: &MockConfig) -> Result<Self> {
        Ok(Self::build(FetchSlot::global(), config.base_url()?))
    }

    /// Create a detached mock for a specific slot.
    pub fn on_slot(slot: &Arc<FetchSlot>, base_url: &str) -> Result<Self> {
        Ok(Self::build(slot, parse_base_url(base_url)?))
    }

    fn build(slot: &Arc<FetchSlot>, base_url: Url) -> Self {
        Self {
            core: Arc::new(MockCore {
                id: MockId::next(),
                base_url,
                pipeline: Mutex::new(Pipeline::new()),
                interceptors: Mutex::new(Vec::new()),
            }),
            slot: Arc::clone(slot),
        }
    }

    /// This mock's identity in the chain.
    pub fn id(&self) -> MockId {
        self.core.id
    }

    /// Base URL relative targets are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.core.base_url
    }

    /// The slot this mock installs into.
    pub fn slot(&self) -> &Arc<FetchSlot> {
        &self.slot
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Handlers
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle requests with a specific method and path.
    ///
    /// The method is compared case-insensitively; a string path must equal
    /// the request path, a `Regex` must match somewhere in it.
    pub fn on<F, Fut, R>(&self, method: &str, path: impl Into<PathMatcher>, handler: F) -> &Self
    where
        F: Fn(Request, Forward) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        self.handle_with(Route::new(method, path, handler))
    }

    /// Handle all requests with an async closure.
    pub fn handle<F, Fut, R>(&self, handler: F) -> &Self
    where
        F: Fn(Request, Forward) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        self.handle_with(handler)
    }

    /// Handle all requests with any [`Handler`].
    pub fn handle_with(&self, handler: impl Handler + 'static) -> &Self {
        self.core.push(Arc::new(handler));
        self
    }

    /// Intercept requests reaching this point of the pipeline.
    ///
    /// Every request that gets here is queued as a deferred request and its
    /// fetch call stays pending until the deferred request is resolved.
    pub fn intercept(&self) -> Interceptor {
        let (handler, interceptor, closer) = intercept::channel();
        lock(&self.core.interceptors).push(closer);
        self.core.push(Arc::new(handler));
        interceptor
    }

    /// Remove all handlers and close all interceptors.
    ///
    /// Requests already queued on an interceptor stay resolvable.
    pub fn reset(&self) -> &Self {
        lock(&self.core.pipeline).clear();
        self.core.close_interceptors();
        self
    }

    /// Get the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        lock(&self.core.pipeline).len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Install / Destroy
    // ─────────────────────────────────────────────────────────────────────────

    /// Install this mock at the head of its slot.
    ///
    /// Re-installing the current head does nothing; installing a mock that
    /// is wrapped by another one fails with [`Error::ChainConflict`].
    pub fn install(&self) -> Result<&Self> {
        self.slot.install(&self.core)?;
        Ok(self)
    }

    /// Remove this mock from its slot, relinking its neighbours.
    pub fn destroy(&self) {
        self.slot.destroy(self.core.id);
    }

    /// Whether this mock is anywhere in the chain.
    pub fn is_installed(&self) -> bool {
        self.slot.contains(self.core.id)
    }

    /// Whether this mock is the head of the chain.
    pub fn is_head(&self) -> bool {
        self.slot.head() == Some(self.core.id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    /// Dispatch directly through this mock and whatever it wraps.
    pub async fn fetch(&self, target: impl Into<FetchTarget>) -> Result<Response> {
        self.fetch_with(target, RequestInit::default()).await
    }

    /// Dispatch directly through this mock with request options.
    pub async fn fetch_with(
        &self,
        target: impl Into<FetchTarget>,
        init: RequestInit,
    ) -> Result<Response> {
        self.slot
            .dispatch(self.core.id, target.into(), init)
            .await
    }
}

impl Default for FetchMock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FetchMock {
    fn drop(&mut self) {
        self.destroy();
        self.core.close_interceptors();
    }
}

impl std::fmt::Debug for FetchMock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchMock")
            .field("id", &self.core.id)
            .field("base_url", &self.core.base_url.as_str())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url =
        Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(format!("{}: not a base URL", base_url)));
    }
    Ok(url)
}
