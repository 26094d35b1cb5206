//! Testing utilities for fetch-mock.
//!
//! Available in unit tests and, through the `testing` feature, to
//! integration tests of other crates.
//!
//! # Components
//!
//! - [`fixtures`]: Common URLs, requests and handlers
//! - [`recording_fetch`]: A real-fetch stand-in that records requests
//! - [`echo_server`]: A local HTTP server echoing requests back as JSON

pub mod echo_server;
pub mod fixtures;
pub mod recording_fetch;

pub use echo_server::EchoServer;
pub use fixtures::*;
pub use recording_fetch::RecordingFetch;

/// Install a `tracing` subscriber for tests.
///
/// Honours `RUST_LOG` and defaults to `warn`. Safe to call from every test.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
