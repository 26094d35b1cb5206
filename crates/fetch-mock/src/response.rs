//! Responses and the builders used to produce them.
//!
//! The builders are pure: each returns a fully materialized [`Response`] with
//! the canonical reason phrase of its status code and, for bodies, a matching
//! `content-type` header.

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Content type of [`text`] responses.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
/// Content type of [`json`] responses.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
/// Content type of [`binary`] responses.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// An immutable HTTP response with a fully buffered body.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    body: Bytes,
    url: Option<Url>,
}

impl Response {
    /// Create an empty response with the canonical status text.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: reason_phrase(status),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url: None,
        }
    }

    /// Create an empty response from a numeric status code.
    pub fn from_status(code: u16) -> Result<Self> {
        Ok(Self::new(status_code(code)?))
    }

    /// Replace the status text.
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())?;
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(self)
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Record the URL this response was fetched from.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Collect a network response into a buffered one.
    ///
    /// Keeps the reason phrase the server sent; falls back to the canonical
    /// one when the server sent none or the canonical one.
    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let url = response.url().clone();
        let headers = response.headers().clone();
        let status_text = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .unwrap_or_else(|| reason_phrase(status));
        let body = response.bytes().await?;

        Ok(Self {
            status,
            status_text,
            headers,
            body,
            url: Some(url),
        })
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The status text (reason phrase).
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// All response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The URL this response came from, for network responses.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// The raw body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

impl Default for Response {
    /// An empty 200 response.
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

fn status_code(code: u16) -> Result<StatusCode> {
    StatusCode::from_u16(code).map_err(|_| Error::InvalidStatus(i32::from(code)))
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

fn with_content(code: u16, content_type: &'static str, body: Bytes) -> Result<Response> {
    let mut response = Response::from_status(code)?.with_body(body);
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    Ok(response)
}

// ============================================================================
// Builders
// ============================================================================

/// A response with the given status and an empty body.
pub fn status(code: u16) -> Result<Response> {
    Response::from_status(code)
}

/// A response with the given status, a custom status text and an empty body.
pub fn status_with_text(code: u16, text: impl Into<String>) -> Result<Response> {
    Ok(Response::from_status(code)?.with_status_text(text))
}

/// A `text/plain` response.
pub fn text(body: impl Into<String>, code: u16) -> Result<Response> {
    with_content(code, TEXT_CONTENT_TYPE, Bytes::from(body.into()))
}

/// A `text/plain` 200 response.
pub fn text_ok(body: impl Into<String>) -> Result<Response> {
    text(body, 200)
}

/// An `application/json` response.
pub fn json<T: Serialize + ?Sized>(value: &T, code: u16) -> Result<Response> {
    let body = serde_json::to_vec(value)?;
    with_content(code, JSON_CONTENT_TYPE, Bytes::from(body))
}

/// An `application/json` 200 response.
pub fn json_ok<T: Serialize + ?Sized>(value: &T) -> Result<Response> {
    json(value, 200)
}

/// An `application/octet-stream` response.
pub fn binary(data: impl Into<Bytes>, code: u16) -> Result<Response> {
    with_content(code, BINARY_CONTENT_TYPE, data.into())
}

/// An `application/octet-stream` 200 response.
pub fn binary_ok(data: impl Into<Bytes>) -> Result<Response> {
    binary(data, 200)
}
