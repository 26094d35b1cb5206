//! Test fixtures for common mocking scenarios.
//!
//! Provides ready-made slots, mocks and requests to reduce test boilerplate.

use std::sync::Arc;

use crate::config::DEFAULT_BASE_URL;
use crate::error::Result;
use crate::mock::FetchMock;
use crate::request::Request;
use crate::response::JSON_CONTENT_TYPE;
use crate::slot::FetchSlot;
use crate::testing::RecordingFetch;

// ============================================================================
// URLs
// ============================================================================

/// An absolute URL that never resolves on a real network.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:1/";

/// Resolve `path` against the default mock base URL.
pub fn test_url(path: &str) -> String {
    format!("{}{}", DEFAULT_BASE_URL, path.trim_start_matches('/'))
}

// ============================================================================
// Slots and Mocks
// ============================================================================

/// A private slot over a [`RecordingFetch`], plus a handle to the recorder.
pub fn recording_slot() -> (Arc<FetchSlot>, RecordingFetch) {
    let real = RecordingFetch::new();
    (FetchSlot::new(real.clone()), real)
}

/// An installed mock on a fresh recording slot.
pub fn installed_mock() -> Result<(Arc<FetchSlot>, FetchMock, RecordingFetch)> {
    let (slot, real) = recording_slot();
    let mock = FetchMock::on_slot(&slot, DEFAULT_BASE_URL)?;
    mock.install()?;
    Ok((slot, mock, real))
}

// ============================================================================
// Requests
// ============================================================================

/// A GET request to `path` under the default base URL.
pub fn get_request(path: &str) -> Result<Request> {
    Request::get(&test_url(path))
}

/// A POST request carrying a JSON body.
pub fn json_post(path: &str, value: &serde_json::Value) -> Result<Request> {
    let url = get_request(path)?.url().clone();
    Ok(Request::new(reqwest::Method::POST, url)
        .with_header("content-type", JSON_CONTENT_TYPE)?
        .with_body(serde_json::to_vec(value)?))
}
