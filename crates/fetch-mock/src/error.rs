//! Error types for fetch mocking.

use thiserror::Error;

/// Result type alias for fetch mock operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while dispatching or resolving mocked fetch calls.
#[derive(Debug, Error)]
pub enum Error {
    /// A mock was asked to dispatch without having captured a predecessor.
    #[error("Global fetch not available (mock not installed?)")]
    NotInstalled,

    /// Attempted to install a mock that is already wrapped by another one.
    #[error("Global fetch already mocked by this instance")]
    ChainConflict,

    /// Default failure of an intercepted request.
    #[error("Error: {0}")]
    Intercepted(String),

    /// Error raised by a handler, or passed explicitly to a deferred request.
    #[error("Handler error: {0}")]
    Handler(String),

    /// A deferred request was resolved more than once.
    #[error("Deferred request already resolved")]
    AlreadyResolved,

    /// A deferred request was dropped before anybody resolved it.
    #[error("Deferred request for {0} dropped without a response")]
    Abandoned(String),

    /// The interceptor queue is empty and no handler can feed it anymore.
    #[error("Interceptor closed")]
    InterceptorClosed,

    /// The request target could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A status code outside of 100..=999.
    #[error("Invalid status code: {0}")]
    InvalidStatus(i32),

    /// An HTTP method that could not be parsed.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// A header name or value that could not be parsed.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// HTTP/network error from the real fetch.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a handler error from any message.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderName> for Error {
    fn from(e: reqwest::header::InvalidHeaderName) -> Self {
        Error::InvalidHeader(e.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        Error::InvalidHeader(e.to_string())
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Handler(message)
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Handler(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Intercepted("https://www.apple.com/".to_string());
        assert_eq!(err.to_string(), "Error: https://www.apple.com/");

        let err = Error::handler("Hello, world!");
        assert_eq!(err.to_string(), "Handler error: Hello, world!");

        assert_eq!(
            Error::ChainConflict.to_string(),
            "Global fetch already mocked by this instance"
        );
    }

    #[test]
    fn test_error_from_strings() {
        assert!(matches!(Error::from("boom"), Error::Handler(m) if m == "boom"));
        assert!(matches!(Error::from("boom".to_string()), Error::Handler(_)));
    }

    #[test]
    fn test_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(Error::from(err), Error::Serialization(_)));
    }
}
