//! Request interception.
//!
//! An interceptor handler turns every request it sees into a
//! [`DeferredRequest`] and queues it; [`Interceptor::next`] hands them out in
//! arrival order. Requests can then be answered in any order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::deferred::{Deferred, DeferredRequest};
use crate::error::{Error, Result};
use crate::handler::{Handler, HandlerOutcome};
use crate::lock;
use crate::request::Request;
use crate::slot::Forward;

type SharedSender = Arc<Mutex<Option<mpsc::UnboundedSender<DeferredRequest>>>>;

/// Create a linked interceptor handler, consumer and close handle.
pub(crate) fn channel() -> (InterceptHandler, Interceptor, InterceptCloser) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let sender: SharedSender = Arc::new(Mutex::new(Some(sender)));
    let queued = Arc::new(AtomicUsize::new(0));
    (
        InterceptHandler {
            sender: Arc::clone(&sender),
            queued: Arc::clone(&queued),
        },
        Interceptor {
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            queued,
        },
        InterceptCloser { sender },
    )
}

/// The handler feeding an [`Interceptor`].
pub(crate) struct InterceptHandler {
    sender: SharedSender,
    queued: Arc<AtomicUsize>,
}

impl InterceptHandler {
    fn enqueue(&self, request: DeferredRequest) -> bool {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return false;
        };
        self.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(request).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }
}

#[async_trait]
impl Handler for InterceptHandler {
    async fn handle(&self, request: Request, forward: Forward) -> Result<HandlerOutcome> {
        let url = request.url().to_string();
        let (deferred, promise) = Deferred::new();

        if !self.enqueue(DeferredRequest::new(request, deferred, forward)) {
            tracing::debug!(url = %url, "Interceptor closed, passing request on");
            return Ok(HandlerOutcome::NoOpinion);
        }
        tracing::trace!(url = %url, "Request intercepted");

        match promise.wait().await {
            Some(resolution) => resolution
                .into_response()
                .await
                .map(HandlerOutcome::Response),
            None => {
                tracing::warn!(url = %url, "Deferred request dropped without a response");
                Err(Error::Abandoned(url))
            }
        }
    }
}

/// Closes an interceptor independently of pipeline snapshots held by
/// in-flight requests.
pub(crate) struct InterceptCloser {
    sender: SharedSender,
}

impl InterceptCloser {
    /// Stop queueing requests. Already queued ones can still be taken.
    pub(crate) fn close(&self) {
        lock(&self.sender).take();
    }
}

/// Consumer of intercepted requests.
///
/// Clones share the same queue. Concurrent [`next`](Self::next) calls are
/// served in the order they were made.
#[derive(Clone)]
pub struct Interceptor {
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<DeferredRequest>>>,
    queued: Arc<AtomicUsize>,
}

impl Interceptor {
    /// Wait for the next intercepted request.
    ///
    /// Requests already intercepted before this call are returned first.
    /// Fails with [`Error::InterceptorClosed`] once the queue is empty and
    /// the mock was reset or dropped.
    pub async fn next(&self) -> Result<DeferredRequest> {
        let mut receiver = self.receiver.lock().await;
        let request = receiver.recv().await.ok_or(Error::InterceptorClosed)?;
        self.queued.fetch_sub(1, Ordering::SeqCst);
        Ok(request)
    }

    /// Take an already intercepted request without waiting.
    ///
    /// Returns `None` while a concurrent [`next`](Self::next) call is
    /// waiting; that call gets the request instead.
    pub fn try_next(&self) -> Option<DeferredRequest> {
        let request = self.receiver.try_lock().ok()?.try_recv().ok()?;
        self.queued.fetch_sub(1, Ordering::SeqCst);
        Some(request)
    }

    /// Number of intercepted requests waiting to be taken.
    pub fn pending(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("pending", &self.pending())
            .finish()
    }
}
