//! fetch-mock: a programmable, stackable interception layer for fetch
//!
//! This crate substitutes a fetch entry point with mock pipelines:
//! - Mocks stack on a [`FetchSlot`] and unwind in any destruction order
//! - Ordered handler pipelines with method and path routing
//! - Interceptors that queue in-flight requests as [`DeferredRequest`]s
//! - Explicit forwarding to the wrapped fetch, never implicit
//! - A `reqwest`-backed real fetch at the bottom of every chain

pub mod config;
pub mod deferred;
pub mod error;
pub mod fetch;
pub mod handler;
pub mod intercept;
pub mod mock;
pub mod request;
pub mod response;
pub mod slot;

// Testing utilities - available in test builds and with the `testing` feature
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::{DEFAULT_BASE_URL, MockConfig};
pub use deferred::{Deferred, DeferredRequest, Promise};
pub use error::{Error, Result};
pub use fetch::{HttpFetch, RealFetch};
pub use handler::{Handler, HandlerOutcome, IntoOutcome, PathMatcher, Pipeline, Route};
pub use intercept::Interceptor;
pub use mock::FetchMock;
pub use request::{FetchTarget, Request, RequestInit};
pub use response::Response;
pub use slot::{FetchSlot, Forward, Link, MockId};

/// Fetch through the process-wide slot.
///
/// Relative targets need an installed mock to resolve against.
pub async fn fetch(target: impl Into<FetchTarget>) -> Result<Response> {
    FetchSlot::global().fetch(target).await
}

/// Fetch through the process-wide slot with request options.
pub async fn fetch_with(target: impl Into<FetchTarget>, init: RequestInit) -> Result<Response> {
    FetchSlot::global().fetch_with(target, init).await
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
