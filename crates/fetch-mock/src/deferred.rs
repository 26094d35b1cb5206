//! Single-assignment deferred values and deferred requests.

use std::sync::Mutex;

use bytes::Bytes;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::lock;
use crate::request::{FetchTarget, Request, RequestInit};
use crate::response::{self, Response};
use crate::slot::Forward;

/// The resolving half of a single-assignment value.
///
/// The first `resolve` wins; every later call returns
/// [`Error::AlreadyResolved`] and has no effect.
#[derive(Debug)]
pub struct Deferred<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

/// The awaiting half of a [`Deferred`].
#[derive(Debug)]
pub struct Promise<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Deferred<T> {
    /// Create a linked deferred/promise pair.
    pub fn new() -> (Self, Promise<T>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(sender)),
            },
            Promise { receiver },
        )
    }

    /// Resolve the promise with `value`.
    pub fn resolve(&self, value: T) -> Result<()> {
        let sender = lock(&self.sender).take().ok_or(Error::AlreadyResolved)?;
        // The awaiting side may be gone already; the value is then discarded.
        let _ = sender.send(value);
        Ok(())
    }

    /// Whether `resolve` has been called.
    pub fn is_resolved(&self) -> bool {
        lock(&self.sender).is_none()
    }
}

impl<T> Promise<T> {
    /// Wait for the value; `None` when the deferred was dropped unresolved.
    pub async fn wait(self) -> Option<T> {
        self.receiver.await.ok()
    }
}

/// How an intercepted request was answered.
pub(crate) enum Resolution {
    /// A response or a failure, known right away.
    Ready(Result<Response>),
    /// A forwarded fetch, run by the waiting fetch call.
    Forwarded(BoxFuture<'static, Result<Response>>),
}

impl Resolution {
    pub(crate) async fn into_response(self) -> Result<Response> {
        match self {
            Resolution::Ready(result) => result,
            Resolution::Forwarded(fetch) => fetch.await,
        }
    }
}

/// An intercepted request whose response is decided by test code.
///
/// Exactly one of the `fail*`, `forward*` or `respond*` methods answers the
/// original fetch call; later calls return [`Error::AlreadyResolved`].
/// Dropping an unresolved deferred request fails the fetch call with
/// [`Error::Abandoned`].
pub struct DeferredRequest {
    request: Request,
    deferred: Deferred<Resolution>,
    forward: Forward,
}

impl DeferredRequest {
    pub(crate) fn new(request: Request, deferred: Deferred<Resolution>, forward: Forward) -> Self {
        Self {
            request,
            deferred,
            forward,
        }
    }

    /// The intercepted request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        self.request.method()
    }

    /// The absolute request URL.
    pub fn url(&self) -> &Url {
        self.request.url()
    }

    /// The path component of the URL.
    pub fn path(&self) -> &str {
        self.request.path()
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    /// A single header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    /// The raw request body.
    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// The request body decoded as UTF-8.
    pub fn text(&self) -> String {
        self.request.text()
    }

    /// The request body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        self.request.json()
    }

    /// Whether this request has been answered.
    pub fn is_resolved(&self) -> bool {
        self.deferred.is_resolved()
    }

    fn settle(&self, resolution: Resolution) -> Result<()> {
        self.deferred.resolve(resolution)
    }

    fn settle_with(&self, response: Result<Response>) -> Result<()> {
        // Builder errors leave the request unresolved.
        self.settle(Resolution::Ready(Ok(response?)))
    }

    /// Fail the fetch call with `Error: <url>`.
    pub fn fail(&self) -> Result<()> {
        let error = Error::Intercepted(self.request.url().to_string());
        self.settle(Resolution::Ready(Err(error)))
    }

    /// Fail the fetch call with a specific error.
    pub fn fail_with(&self, error: impl Into<Error>) -> Result<()> {
        self.settle(Resolution::Ready(Err(error.into())))
    }

    /// Answer with whatever fetching `target` through the wrapped entry
    /// yields, success or failure.
    pub fn forward(&self, target: impl Into<FetchTarget>) -> Result<()> {
        self.forward_with(target, RequestInit::default())
    }

    /// Like [`forward`](Self::forward), with request options.
    pub fn forward_with(&self, target: impl Into<FetchTarget>, init: RequestInit) -> Result<()> {
        let forward = self.forward.clone();
        let target = target.into();
        self.settle(Resolution::Forwarded(Box::pin(async move {
            forward.fetch_with(target, init).await
        })))
    }

    /// Forward the intercepted request itself.
    pub fn pass_through(&self) -> Result<()> {
        self.forward(self.request.clone())
    }

    /// Answer with `response`.
    pub fn respond(&self, response: Response) -> Result<()> {
        self.settle(Resolution::Ready(Ok(response)))
    }

    /// Answer with an empty 200 response.
    pub fn respond_default(&self) -> Result<()> {
        self.respond(Response::default())
    }

    /// Answer with an empty response carrying `code`.
    pub fn respond_status(&self, code: u16) -> Result<()> {
        self.settle_with(response::status(code))
    }

    /// Answer with a text body.
    pub fn respond_text(&self, text: impl Into<String>, code: u16) -> Result<()> {
        self.settle_with(response::text(text, code))
    }

    /// Answer with a JSON body.
    pub fn respond_json<T: Serialize + ?Sized>(&self, value: &T, code: u16) -> Result<()> {
        self.settle_with(response::json(value, code))
    }

    /// Answer with a binary body.
    pub fn respond_binary(&self, data: impl Into<Bytes>, code: u16) -> Result<()> {
        self.settle_with(response::binary(data, code))
    }
}

impl std::fmt::Debug for DeferredRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredRequest")
            .field("method", self.request.method())
            .field("url", &self.request.url().as_str())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
