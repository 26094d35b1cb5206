//! Requests, fetch targets and request options.
//!
//! A fetch call takes a [`FetchTarget`] (a string, a URL or a whole
//! [`Request`]) plus optional [`RequestInit`] overrides, the same pair the
//! `fetch(target, options)` entry point accepts.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// An owned HTTP request.
///
/// The body is an immutable buffer, so clones are independently readable.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Create a request with no headers and an empty body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a GET request for an absolute URL.
    pub fn get(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self::new(Method::GET, url))
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        self.headers.insert(name, HeaderValue::from_str(value)?);
        Ok(())
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The absolute request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The path component of the URL.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A single header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
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

    /// Apply request options on top of this request.
    pub fn apply(&mut self, init: &RequestInit) -> Result<()> {
        if let Some(method) = &init.method {
            self.method = parse_method(method)?;
        }
        for (name, value) in &init.headers {
            self.set_header(name, value)?;
        }
        if let Some(body) = &init.body {
            self.body = body.clone();
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Method, Url, HeaderMap, Bytes) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Parse a method name, upper-casing the standard ones the way fetch does.
fn parse_method(method: &str) -> Result<Method> {
    const NORMALIZED: [&str; 6] = ["DELETE", "GET", "HEAD", "OPTIONS", "POST", "PUT"];

    let upper = method.to_ascii_uppercase();
    let name = if NORMALIZED.contains(&upper.as_str()) {
        upper.as_str()
    } else {
        method
    };
    Method::from_bytes(name.as_bytes()).map_err(|_| Error::InvalidMethod(method.to_string()))
}

/// Optional overrides for a fetch call.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    method: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
}

impl RequestInit {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the method (standard methods are matched case-insensitively).
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body and the matching content type.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header("content-type", "application/json")
            .body(body))
    }
}

/// The target of a fetch call.
#[derive(Debug, Clone)]
pub enum FetchTarget {
    /// An absolute or relative URL string.
    Text(String),
    /// A parsed URL.
    Url(Url),
    /// A complete request.
    Request(Request),
}

impl FetchTarget {
    /// Resolve into a request, joining string and URL targets onto `base`.
    pub fn resolve(&self, base: &Url, init: &RequestInit) -> Result<Request> {
        let mut request = match self {
            FetchTarget::Text(text) => Request::new(Method::GET, join(base, text)?),
            FetchTarget::Url(url) => Request::new(Method::GET, join(base, url.as_str())?),
            FetchTarget::Request(request) => request.clone(),
        };
        request.apply(init)?;
        Ok(request)
    }

    /// Resolve into a request without a base; relative targets are rejected.
    pub fn resolve_absolute(&self, init: &RequestInit) -> Result<Request> {
        let mut request = match self {
            FetchTarget::Text(text) => Request::get(text)?,
            FetchTarget::Url(url) => Request::new(Method::GET, url.clone()),
            FetchTarget::Request(request) => request.clone(),
        };
        request.apply(init)?;
        Ok(request)
    }
}

fn join(base: &Url, target: &str) -> Result<Url> {
    base.join(target)
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", target, e)))
}

impl From<&str> for FetchTarget {
    fn from(text: &str) -> Self {
        FetchTarget::Text(text.to_string())
    }
}

impl From<String> for FetchTarget {
    fn from(text: String) -> Self {
        FetchTarget::Text(text)
    }
}

impl From<&String> for FetchTarget {
    fn from(text: &String) -> Self {
        FetchTarget::Text(text.clone())
    }
}

impl From<Url> for FetchTarget {
    fn from(url: Url) -> Self {
        FetchTarget::Url(url)
    }
}

impl From<&Url> for FetchTarget {
    fn from(url: &Url) -> Self {
        FetchTarget::Url(url.clone())
    }
}

impl From<Request> for FetchTarget {
    fn from(request: Request) -> Self {
        FetchTarget::Request(request)
    }
}

impl From<&Request> for FetchTarget {
    fn from(request: &Request) -> Self {
        FetchTarget::Request(request.clone())
    }
}
