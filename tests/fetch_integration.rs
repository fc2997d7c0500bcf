//! Integration tests for the shared fetch client against a mock server.

use std::time::Duration;

use mediahub_core::{FetchClient, FetchError, FetchSettings, RequestContext, RetryPolicy};
use serde_json::Value;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn client(attempts: u32, cache_ttl: Duration) -> FetchClient {
    FetchClient::with_settings(&FetchSettings {
        retry: RetryPolicy::immediate(attempts),
        cache_ttl,
        ..FetchSettings::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_get_text_sends_browser_headers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header_regex("user-agent", "Mozilla/5.0"))
        .and(header_regex("accept-language", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(1, Duration::ZERO)
        .get_text(&format!("{}/page", server.uri()), &RequestContext::new())
        .await
        .unwrap();
    assert_eq!(body, "<html>ok</html>");
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let body = client(3, Duration::ZERO)
        .get_text(&format!("{}/flaky", server.uri()), &RequestContext::new())
        .await
        .unwrap();
    assert_eq!(body, "recovered");
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(3, Duration::ZERO)
        .get_text(&format!("{}/missing", server.uri()), &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_status() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let err = client(2, Duration::ZERO)
        .get_text(&format!("{}/down", server.uri()), &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 502, .. }));
}

#[tokio::test]
async fn test_page_cache_serves_repeat_requests() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(ResponseTemplate::new(200).set_body_string("once"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(1, Duration::from_secs(60));
    let url = format!("{}/cached", server.uri());
    let ctx = RequestContext::new();
    assert_eq!(client.get_text(&url, &ctx).await.unwrap(), "once");
    assert_eq!(client.get_text(&url, &ctx).await.unwrap(), "once");
}

#[tokio::test]
async fn test_json_is_never_cached() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"n": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(1, Duration::from_secs(60));
    let url = format!("{}/api", server.uri());
    let ctx = RequestContext::new();
    for _ in 0..2 {
        let value: Value = client.get_json(&url, &ctx).await.unwrap();
        assert_eq!(value["n"], 1);
    }
}

#[tokio::test]
async fn test_json_decode_failure() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client(1, Duration::ZERO)
        .get_json::<Value>(&format!("{}/broken", server.uri()), &RequestContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn test_json_with_headers_sends_referer() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/guarded"))
        .and(header("referer", "https://player.example/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::REFERER,
        reqwest::header::HeaderValue::from_static("https://player.example/"),
    );
    let value: Value = client(1, Duration::ZERO)
        .get_json_with_headers(
            &format!("{}/guarded", server.uri()),
            &headers,
            &RequestContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn test_head_location_resolves_relative_redirect() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("HEAD"))
        .and(path("/hop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/final/file.mkv"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/plain"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(1, Duration::ZERO);
    let ctx = RequestContext::new();
    let location = client
        .head_location(&format!("{}/hop", server.uri()), &ctx)
        .await
        .unwrap();
    assert_eq!(location, Some(format!("{}/final/file.mkv", server.uri())));

    let none = client
        .head_location(&format!("{}/plain", server.uri()), &ctx)
        .await
        .unwrap();
    assert_eq!(none, None);
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    ctx.cancel();
    let err = client(3, Duration::ZERO)
        .get_text(&format!("{}/any", server.uri()), &ctx)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_cancel_during_slow_response() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let started = std::time::Instant::now();
    let err = client(1, Duration::ZERO)
        .get_text(&format!("{}/slow", server.uri()), &ctx)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(2));
}
