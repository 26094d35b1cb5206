//! Handlers and the pipeline that evaluates them.
//!
//! # Architecture
//!
//! - `Handler`: answers a request, or declines with `HandlerOutcome::NoOpinion`
//! - `IntoOutcome`: lets handler closures return a response, a status code,
//!   nothing at all, or a `Result` of any of those
//! - `Route`: a handler guarded by a method and a path matcher
//! - `Pipeline`: the ordered handler list of one mock

use async_trait::async_trait;
use regex::Regex;
use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::{self, Response};
use crate::slot::Forward;

/// What a handler decided for a request.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Let the next handler decide.
    NoOpinion,
    /// Answer with an empty response carrying this status.
    Status(u16),
    /// Answer with this response.
    Response(Response),
}

/// Conversion of handler return values into a [`HandlerOutcome`].
pub trait IntoOutcome {
    /// Convert into an outcome, or the error the handler raised.
    fn into_outcome(self) -> Result<HandlerOutcome>;
}

impl IntoOutcome for HandlerOutcome {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        Ok(self)
    }
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        Ok(HandlerOutcome::Response(self))
    }
}

impl IntoOutcome for u16 {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        Ok(HandlerOutcome::Status(self))
    }
}

// Unsuffixed integer literals fall back to i32.
impl IntoOutcome for i32 {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        u16::try_from(self)
            .map(HandlerOutcome::Status)
            .map_err(|_| Error::InvalidStatus(self))
    }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        Ok(HandlerOutcome::Status(self.as_u16()))
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        Ok(HandlerOutcome::NoOpinion)
    }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        match self {
            Some(value) => value.into_outcome(),
            None => Ok(HandlerOutcome::NoOpinion),
        }
    }
}

impl<T: IntoOutcome, E: Into<Error>> IntoOutcome for std::result::Result<T, E> {
    fn into_outcome(self) -> Result<HandlerOutcome> {
        self.map_err(Into::into)?.into_outcome()
    }
}

/// A request handler registered on a mock.
///
/// Handlers receive their own copy of the request and a [`Forward`] that
/// reaches whatever the mock wrapped when it was installed. Any async closure
/// `Fn(Request, Forward) -> impl Future<Output = impl IntoOutcome>` is a
/// handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Decide what to answer for `request`.
    async fn handle(&self, request: Request, forward: Forward) -> Result<HandlerOutcome>;
}

#[async_trait]
impl<F, Fut, R> Handler for F
where
    F: Fn(Request, Forward) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + 'static,
{
    async fn handle(&self, request: Request, forward: Forward) -> Result<HandlerOutcome> {
        (self)(request, forward).await.into_outcome()
    }
}

/// Matches request paths for [`Route`]s.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    /// The path must equal this string.
    Exact(String),
    /// The path must contain a match of this pattern.
    Pattern(Regex),
}

impl PathMatcher {
    /// Check whether `path` is matched.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(expected) => expected == path,
            PathMatcher::Pattern(pattern) => pattern.is_match(path),
        }
    }
}

impl From<&str> for PathMatcher {
    fn from(path: &str) -> Self {
        PathMatcher::Exact(path.to_string())
    }
}

impl From<String> for PathMatcher {
    fn from(path: String) -> Self {
        PathMatcher::Exact(path)
    }
}

impl From<Regex> for PathMatcher {
    fn from(pattern: Regex) -> Self {
        PathMatcher::Pattern(pattern)
    }
}

impl From<&Regex> for PathMatcher {
    fn from(pattern: &Regex) -> Self {
        PathMatcher::Pattern(pattern.clone())
    }
}

/// A handler that only runs for one method and matching paths.
pub struct Route {
    method: String,
    path: PathMatcher,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Guard `handler` with a method and a path matcher.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<PathMatcher>,
        handler: impl Handler + 'static,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            handler: Arc::new(handler),
        }
    }

    /// Check whether this route applies to `request`.
    pub fn matches(&self, request: &Request) -> bool {
        request.method().as_str().eq_ignore_ascii_case(&self.method)
            && self.path.matches(request.path())
    }
}

#[async_trait]
impl Handler for Route {
    async fn handle(&self, request: Request, forward: Forward) -> Result<HandlerOutcome> {
        if !self.matches(&request) {
            return Ok(HandlerOutcome::NoOpinion);
        }
        self.handler.handle(request, forward).await
    }
}

/// The ordered handlers of one mock.
#[derive(Clone, Default)]
pub struct Pipeline {
    handlers: Vec<Arc<dyn Handler>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn push(&mut self, handler: Arc<dyn Handler>) {
        self.handlers.push(handler);
    }

    /// Remove all handlers.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Get the number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the pipeline has no handlers.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run handlers in registration order until one answers.
    ///
    /// Returns `None` when every handler declined. Handler errors are not
    /// caught.
    pub async fn run(&self, request: &Request, forward: &Forward) -> Result<Option<Response>> {
        for (index, handler) in self.handlers.iter().enumerate() {
            let outcome = handler.handle(request.clone(), forward.clone()).await?;
            match outcome {
                HandlerOutcome::NoOpinion => continue,
                HandlerOutcome::Status(code) => {
                    tracing::trace!(handler = index, status = code, "Handler answered");
                    return response::status(code).map(Some);
                }
                HandlerOutcome::Response(response) => {
                    tracing::trace!(handler = index, status = %response.status(), "Handler answered");
                    return Ok(Some(response));
                }
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
