//! HTTP echo server for integration testing.
//!
//! Gives forwarded and real fetches a local target: every request is answered
//! with a JSON description of itself.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri, header::USER_AGENT},
};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A local HTTP server echoing requests as JSON.
///
/// The response body carries `method`, `path`, `query`, `body` and
/// `user_agent`.
///
/// # Example
///
/// ```ignore
/// use fetch_mock::testing::EchoServer;
///
/// let server = EchoServer::start().await;
/// let response = fetch_mock::fetch(format!("{}/hello", server.url())).await?;
/// server.shutdown().await;
/// ```
pub struct EchoServer {
    /// Server address.
    addr: SocketAddr,
    /// Requests served so far.
    requests: Arc<AtomicUsize>,
    /// Shutdown signal sender.
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Server task handle.
    handle: Option<JoinHandle<()>>,
}

impl EchoServer {
    /// Start a new echo server on a random available port.
    pub async fn start() -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .fallback(handle_echo)
            .with_state(Arc::clone(&requests));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind echo server");
        let addr = listener.local_addr().expect("Failed to get local address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        tracing::debug!(%addr, "Echo server started");

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Get the server's base URL, without a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the server's address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the number of requests served.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Shutdown the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_echo(
    State(requests): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    requests.fetch_add(1, Ordering::SeqCst);
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "body": String::from_utf8_lossy(&body),
        "user_agent": user_agent,
    }))
}
