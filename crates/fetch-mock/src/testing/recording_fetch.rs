//! Recording real fetch for tests.
//!
//! Stands in for the network at the bottom of a chain: captures every request
//! and returns queued results, or an echo of the URL when the queue is empty.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::fetch::RealFetch;
use crate::lock;
use crate::request::Request;
use crate::response::{self, Response};

/// A [`RealFetch`] that never touches the network.
///
/// Clones share captured requests and queued results.
///
/// # Example
///
/// ```ignore
/// use fetch_mock::FetchSlot;
/// use fetch_mock::testing::RecordingFetch;
///
/// let real = RecordingFetch::new().with_response(response::text_ok("hi")?);
/// let slot = FetchSlot::new(real.clone());
/// slot.fetch("http://real.test/").await?;
/// real.assert_request_count(1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingFetch {
    /// Queued results, returned in order.
    results: Arc<Mutex<VecDeque<Result<Response>>>>,
    /// Captured requests for assertions.
    requests: Arc<Mutex<Vec<Request>>>,
}

impl RecordingFetch {
    /// Create an empty recording fetch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response to the queue.
    pub fn with_response(self, response: Response) -> Self {
        self.queue_response(response);
        self
    }

    /// Queue a response for the next request.
    pub fn queue_response(&self, response: Response) {
        lock(&self.results).push_back(Ok(response));
    }

    /// Queue a failure for the next request.
    pub fn queue_error(&self, error: Error) {
        lock(&self.results).push_back(Err(error));
    }

    /// Get all captured requests.
    pub fn captured_requests(&self) -> Vec<Request> {
        lock(&self.requests).clone()
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Assert that exactly N requests reached the real fetch.
    ///
    /// # Panics
    ///
    /// Panics if the request count doesn't match.
    pub fn assert_request_count(&self, expected: usize) {
        let actual = self.request_count();
        assert_eq!(
            actual, expected,
            "Expected {} real requests, but got {}",
            expected, actual
        );
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<Request> {
        lock(&self.requests).last().cloned()
    }

    /// Clear all captured requests.
    pub fn clear_requests(&self) {
        lock(&self.requests).clear();
    }
}

#[async_trait]
impl RealFetch for RecordingFetch {
    async fn fetch(&self, request: Request) -> Result<Response> {
        let url = request.url().clone();
        lock(&self.requests).push(request);

        match lock(&self.results).pop_front() {
            Some(result) => result,
            None => Ok(response::text_ok(url.as_str())?.with_url(url)),
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_url_when_queue_is_empty() {
        let real = RecordingFetch::new();
        let response = real.fetch(Request::get("http://real.test/a").unwrap()).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.text(), "http://real.test/a");
        assert_eq!(response.url().unwrap().as_str(), "http://real.test/a");
    }

    #[tokio::test]
    async fn test_queued_results_in_order() {
        let real = RecordingFetch::new().with_response(response::status(201).unwrap());
        real.queue_error(Error::Network("down".to_string()));

        let first = real.fetch(Request::get("http://real.test/1").unwrap()).await;
        let second = real.fetch(Request::get("http://real.test/2").unwrap()).await;
        assert_eq!(first.unwrap().status(), 201);
        assert!(matches!(second, Err(Error::Network(_))));

        real.assert_request_count(2);
        assert_eq!(real.last_request().unwrap().path(), "/2");

        real.clear_requests();
        assert!(real.captured_requests().is_empty());
    }
}
