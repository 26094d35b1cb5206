//! End-to-end scenarios against the process-wide fetch slot
//!
//! Every test here installs mocks on `FetchSlot::global()`, so they are
//! serialised and each one leaves the slot unmocked when it finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use fetch_mock::testing::{EchoServer, init_test_logging};
use fetch_mock::{
    Error, FetchMock, FetchSlot, HandlerOutcome, MockConfig, RequestInit, fetch, fetch_with,
    response,
};
use regex::Regex;
use serial_test::serial;

/// Assert the global slot is back to the real fetch.
fn assert_unmocked() {
    assert!(!FetchSlot::global().is_mocked());
    assert_eq!(FetchSlot::global().depth(), 0);
}

/// Scenario: a single handler answers every request with its status.
#[tokio::test]
#[serial]
async fn test_handler_status_answers_fetch() {
    init_test_logging();
    let mock = FetchMock::new();
    mock.handle(|_req, _fwd| async { 599 });
    mock.install().unwrap();

    let response = fetch("http://x/").await.unwrap();
    assert_eq!(response.status(), 599);

    mock.destroy();
    assert_unmocked();
}

/// Scenario: the first handler declines, the second answers; only the
/// answering handler's effects are visible.
#[tokio::test]
#[serial]
async fn test_pipeline_falls_through_to_second_handler() {
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));

    let mock = FetchMock::new();
    {
        let first_calls = Arc::clone(&first_calls);
        mock.handle(move |_req, _fwd| {
            first_calls.fetch_add(1, Ordering::SeqCst);
            async { HandlerOutcome::NoOpinion }
        });
    }
    {
        let second_calls = Arc::clone(&second_calls);
        mock.handle(move |_req, _fwd| {
            second_calls.fetch_add(1, Ordering::SeqCst);
            async { 201 }
        });
    }
    mock.install().unwrap();

    assert_eq!(fetch("/anything").await.unwrap().status(), 201);
    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);

    drop(mock);
    assert_unmocked();
}

/// Scenario: three stacked mocks, each owning one path; destroying the
/// middle one only removes its path. Unanswered requests fall through to the
/// mock below.
#[tokio::test]
#[serial]
async fn test_destroying_middle_mock_keeps_outer_layers() {
    let foo = FetchMock::new();
    foo.on("GET", "/foo", |_req, _fwd| async { response::text_ok("foo") });
    foo.install().unwrap();

    let bar = FetchMock::new();
    bar.on("GET", "/bar", |_req, _fwd| async { response::text_ok("bar") });
    bar.install().unwrap();

    let baz = FetchMock::new();
    baz.on("GET", "/baz", |_req, _fwd| async { response::text_ok("baz") });
    baz.install().unwrap();

    for path in ["/foo", "/bar", "/baz"] {
        let response = fetch(path).await.unwrap();
        assert_eq!(response.text(), &path[1..]);
    }

    bar.destroy();
    assert_eq!(FetchSlot::global().chain(), vec![baz.id(), foo.id()]);

    assert_eq!(fetch("/foo").await.unwrap().text(), "foo");
    assert_eq!(fetch("/baz").await.unwrap().text(), "baz");
    assert_eq!(fetch("/bar").await.unwrap().status(), 404);

    baz.destroy();
    assert!(foo.is_head());
    assert_eq!(fetch("/foo").await.unwrap().text(), "foo");

    foo.destroy();
    assert_unmocked();
}

/// Scenario: responses follow the deferred request they were given to, not
/// the order in which requests were resolved.
#[tokio::test]
#[serial]
async fn test_interceptor_out_of_order_resolution() {
    let mock = FetchMock::new();
    let interceptor = mock.intercept();
    mock.install().unwrap();

    let apple = tokio::spawn(fetch("https://www.apple.com/"));
    let google = tokio::spawn(fetch("https://www.google.com/"));

    let first = interceptor.next().await.unwrap();
    let second = interceptor.next().await.unwrap();

    let (a, b) = if first.url().host_str() == Some("www.apple.com") {
        (first, second)
    } else {
        (second, first)
    };
    b.respond_text("B", 200).unwrap();
    a.respond_text("A", 200).unwrap();

    assert_eq!(apple.await.unwrap().unwrap().text(), "A");
    assert_eq!(google.await.unwrap().unwrap().text(), "B");

    mock.destroy();
    assert_unmocked();
}

/// Scenario: JSON responses carry status, content type and body.
#[tokio::test]
#[serial]
async fn test_interceptor_json_response() {
    let mock = FetchMock::new();
    let interceptor = mock.intercept();
    mock.install().unwrap();

    let pending = tokio::spawn(fetch("/data"));
    interceptor
        .next()
        .await
        .unwrap()
        .respond_json(&serde_json::json!({"a": 1}), 201)
        .unwrap();

    let response = pending.await.unwrap().unwrap();
    assert_eq!(response.status(), 201);
    assert!(
        response
            .header("content-type")
            .unwrap()
            .starts_with("application/json")
    );
    assert_eq!(
        response.json::<serde_json::Value>().unwrap(),
        serde_json::json!({"a": 1})
    );

    mock.destroy();
    assert_unmocked();
}

#[tokio::test]
#[serial]
async fn test_method_and_path_matching() {
    let mock = FetchMock::new();
    mock.on("GET", "/foo", |_req, _fwd| async { 201 })
        .on("POST", Regex::new("^/ba[rz]$").unwrap(), |_req, _fwd| async {
            202
        })
        .on("put", Regex::new("^/(this|that)$").unwrap(), |_req, _fwd| async {
            203
        });
    mock.install().unwrap();

    let cases: &[(&str, &str, u16)] = &[
        ("GET", "/foo", 201),
        ("get", "/foo", 201),
        ("POST", "/foo", 404),
        ("POST", "/bar", 202),
        ("post", "/baz", 202),
        ("POST", "/bat", 404),
        ("PUT", "/this", 203),
        ("put", "/that", 203),
        ("PUT", "/other", 404),
        ("DELETE", "/foo", 404),
    ];
    for (method, path, expected) in cases {
        let response = fetch_with(*path, RequestInit::new().method(*method))
            .await
            .unwrap();
        assert_eq!(response.status(), *expected, "{} {}", method, path);
    }

    mock.destroy();
    assert_unmocked();
}

#[tokio::test]
#[serial]
async fn test_relative_targets_resolve_against_base_url() {
    let mock = FetchMock::with_base_url("https://api.example.com/v1/").unwrap();
    mock.handle(|req, _fwd| async move { response::text_ok(req.url().to_string()) });
    mock.install().unwrap();

    assert_eq!(
        fetch("users").await.unwrap().text(),
        "https://api.example.com/v1/users"
    );
    assert_eq!(
        fetch("/root").await.unwrap().text(),
        "https://api.example.com/root"
    );
    assert_eq!(
        fetch("http://other.test/x").await.unwrap().text(),
        "http://other.test/x"
    );

    mock.destroy();
    assert_unmocked();
}

#[tokio::test]
#[serial]
async fn test_mock_from_config() {
    let config = MockConfig::from_toml_str("base_url = \"http://configured.test/\"").unwrap();
    let mock = FetchMock::from_config(&config).unwrap();
    mock.on("GET", "/ping", |_req, _fwd| async { 204 });
    mock.install().unwrap();

    let response = fetch("/ping").await.unwrap();
    assert_eq!(response.status(), 204);

    mock.destroy();
    assert_unmocked();
}

#[tokio::test]
#[serial]
async fn test_interceptor_forwards_to_real_network() {
    let server = EchoServer::start().await;
    let mock = FetchMock::new();
    let interceptor = mock.intercept();
    mock.install().unwrap();

    let pending = tokio::spawn(fetch_with(
        "/ignored",
        RequestInit::new().method("POST").body("hello"),
    ));
    let request = interceptor.next().await.unwrap();
    assert_eq!(request.text(), "hello");
    request
        .forward_with(
            format!("{}/echo", server.url()),
            RequestInit::new().method("PUT").body(request.body().clone()),
        )
        .unwrap();

    let echo: serde_json::Value = pending.await.unwrap().unwrap().json().unwrap();
    assert_eq!(echo["method"], "PUT");
    assert_eq!(echo["path"], "/echo");
    assert_eq!(echo["body"], "hello");
    assert_eq!(server.request_count(), 1);

    mock.destroy();
    assert_unmocked();
    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_interceptor_failures() {
    let mock = FetchMock::new();
    let interceptor = mock.intercept();
    mock.install().unwrap();

    let apple = tokio::spawn(fetch("https://www.apple.com/"));
    interceptor.next().await.unwrap().fail().unwrap();
    let err = apple.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Error: https://www.apple.com/");

    let google = tokio::spawn(fetch("https://www.google.com/"));
    interceptor
        .next()
        .await
        .unwrap()
        .fail_with(Error::handler("Hello, world!"))
        .unwrap();
    let err = google.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Handler(message) if message == "Hello, world!"));

    mock.destroy();
    assert_unmocked();
}

#[tokio::test]
#[serial]
async fn test_interceptor_forward_to_unreachable_fails() {
    let mock = FetchMock::new();
    let interceptor = mock.intercept();
    mock.install().unwrap();

    let pending = tokio::spawn(fetch("/x"));
    interceptor
        .next()
        .await
        .unwrap()
        .forward(fetch_mock::testing::UNREACHABLE_URL)
        .unwrap();
    assert!(matches!(pending.await.unwrap(), Err(Error::Network(_))));

    mock.destroy();
    assert_unmocked();
}

/// Three layers wrapping each other: each one forwards to what it wrapped,
/// tagging the response on the way out.
#[tokio::test]
#[serial]
async fn test_three_layer_wrapping() {
    let server = EchoServer::start().await;
    let target = format!("{}/wrapped", server.url());

    let layers: Vec<FetchMock> = ["inner", "middle", "outer"]
        .into_iter()
        .map(|name| {
            let mock = FetchMock::new();
            mock.handle(move |req, fwd| async move {
                let inner = fwd.fetch(req).await?;
                let trail = inner.header("x-trail").unwrap_or_default().to_string();
                let trail = if trail.is_empty() {
                    name.to_string()
                } else {
                    format!("{},{}", trail, name)
                };
                inner.with_header("x-trail", &trail)
            });
            mock.install().unwrap();
            mock
        })
        .collect();

    let response = fetch(target.as_str()).await.unwrap();
    assert_eq!(response.header("x-trail"), Some("inner,middle,outer"));
    assert_eq!(server.request_count(), 1);

    // Middle first, then the top layer.
    layers[1].destroy();
    let response = fetch(target.as_str()).await.unwrap();
    assert_eq!(response.header("x-trail"), Some("inner,outer"));

    layers[2].destroy();
    let response = fetch(target.as_str()).await.unwrap();
    assert_eq!(response.header("x-trail"), Some("inner"));

    drop(layers);
    assert_unmocked();

    let response = fetch(target.as_str()).await.unwrap();
    assert_eq!(response.header("x-trail"), None);
    assert_eq!(server.request_count(), 4);

    server.shutdown().await;
}

#[tokio::test]
#[serial]
async fn test_unmocked_fetch_reaches_network() {
    assert_unmocked();
    let server = EchoServer::start().await;

    let echo: serde_json::Value = fetch(format!("{}/plain", server.url()))
        .await
        .unwrap()
        .json()
        .unwrap();
    assert_eq!(echo["path"], "/plain");

    server.shutdown().await;
}
