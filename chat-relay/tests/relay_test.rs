//! Relay behaviour against a live mock upstream.

mod common;

use common::{spawn_relay, spawn_upstream, CHAT_STREAM_BODY};
use reqwest::{header, Client, Method, StatusCode};
use serde_json::{json, Value};

fn assert_cors(headers: &header::HeaderMap) {
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, PATCH, OPTIONS"
    );
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
}

#[tokio::test]
async fn get_forwards_path_and_query_without_body() {
    let (upstream, recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .get(format!("{}/api/proxy/foo/bar?x=1", relay))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(response.headers());
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"ok": true}));

    let seen = recorder.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.path_and_query, "/foo/bar?x=1");
    assert!(seen.body.is_empty());
    assert_eq!(seen.headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn post_forwards_identical_bytes_and_only_authorization() {
    let (upstream, recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .post(format!("{}/api/proxy/api/v1/pitches", relay))
        .header(header::AUTHORIZATION, "Bearer token-abc")
        .header("x-campaign", "launch")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(r#"{"a":1}"#)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);

    let seen = recorder.last();
    assert_eq!(seen.method, Method::POST);
    assert_eq!(seen.body.as_ref(), br#"{"a":1}"#);
    assert_eq!(seen.headers[header::AUTHORIZATION], "Bearer token-abc");
    assert_eq!(seen.headers[header::CONTENT_TYPE], "application/json");
    assert!(seen.headers.get("x-campaign").is_none());
}

#[tokio::test]
async fn delete_never_carries_a_body() {
    let (upstream, recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    Client::new()
        .delete(format!("{}/api/proxy/api/v1/chatbot/sessions/s1", relay))
        .body("ignored")
        .send()
        .await
        .expect("Failed to send request");

    let seen = recorder.last();
    assert_eq!(seen.method, Method::DELETE);
    assert!(seen.body.is_empty());
}

#[tokio::test]
async fn put_and_patch_forward_their_bodies() {
    let (upstream, recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let client = Client::new();

    for (method, body) in [
        (Method::PUT, r#"{"title":"Launch pitch"}"#),
        (Method::PATCH, r#"{"status":"sent"}"#),
    ] {
        let response = client
            .request(method.clone(), format!("{}/api/proxy/api/v1/pitches/p1?v=2", relay))
            .body(body)
            .send()
            .await
            .expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(response.headers());

        let seen = recorder.last();
        assert_eq!(seen.method, method);
        assert_eq!(seen.path_and_query, "/api/v1/pitches/p1?v=2");
        assert_eq!(seen.body.as_ref(), body.as_bytes());
    }
}

#[tokio::test]
async fn authorization_with_opaque_bytes_is_forwarded_verbatim() {
    let (upstream, recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;
    let value = header::HeaderValue::from_bytes(b"Bearer caf\xe9").unwrap();

    let response = Client::new()
        .get(format!("{}/api/proxy/api/v1/pitches", relay))
        .header(header::AUTHORIZATION, value.clone())
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorder.last().headers[header::AUTHORIZATION], value);
}

#[tokio::test]
async fn options_is_answered_locally() {
    let (upstream, recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .request(Method::OPTIONS, format!("{}/api/proxy/anything", relay))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(response.headers());
    assert_eq!(response.headers()[header::ACCESS_CONTROL_MAX_AGE], "86400");
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn chat_path_is_streamed_byte_for_byte() {
    let (upstream, _recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .post(format!("{}/api/proxy/api/v1/chatbot/message", relay))
        .body(r#"{"message":"hi"}"#)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(response.headers());
    // Upstream content type wins even when it is not an event stream.
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.text().await.unwrap(), CHAT_STREAM_BODY);
}

#[tokio::test]
async fn event_stream_content_type_is_streamed() {
    let (upstream, _recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .get(format!("{}/api/proxy/events", relay))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.text().await.unwrap(), "data: {\"n\":1}\n\n");
}

#[tokio::test]
async fn non_json_body_is_reencoded_as_json_string() {
    let (upstream, _recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .get(format!("{}/api/proxy/plain", relay))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(response.json::<Value>().await.unwrap(), json!("not json"));
}

#[tokio::test]
async fn upstream_status_is_mirrored() {
    let (upstream, _recorder) = spawn_upstream().await;
    let relay = spawn_relay(&upstream).await;

    let response = Client::new()
        .get(format!("{}/api/proxy/missing", relay))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(response.headers());
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "Pitch not found"})
    );
}

#[tokio::test]
async fn unreachable_upstream_yields_fixed_500() {
    // Bind then drop a listener so the port is known to be closed.
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let relay = spawn_relay(&format!("http://127.0.0.1:{}", port)).await;

    let response = Client::new()
        .get(format!("{}/api/proxy/foo", relay))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(response.headers());
    assert_eq!(
        response.json::<Value>().await.unwrap(),
        json!({"detail": "Proxy request failed", "error": "upstream_unreachable"})
    );
}
