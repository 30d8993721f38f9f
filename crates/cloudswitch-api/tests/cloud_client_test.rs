#![allow(clippy::unwrap_used)]
// Integration tests for `CloudClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudswitch_api::{CloudClient, Error};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = CloudClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn secret(s: &str) -> secrecy::SecretString {
    s.to_owned().into()
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=jasom"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "254406f79c1999af65a7df4388971354f85cfee9",
            "token_type": "bearer",
            "expires_in": 7_776_000
        })))
        .mount(&server)
        .await;

    let token = client.login("jasom", &secret("hunter2")).await.unwrap();
    assert_eq!(token.expires_in, Some(7_776_000));
    assert!(client.has_token());
}

#[tokio::test]
async fn test_login_failure_uses_error_description() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "User credentials are invalid"
        })))
        .mount(&server)
        .await;

    let result = client.login("jasom", &secret("wrong")).await;

    match result {
        Err(Error::Authentication { ref message }) => {
            assert!(
                message.contains("credentials are invalid"),
                "expected cloud message, got: {message}"
            );
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert!(!client.has_token());
}

#[tokio::test]
async fn test_revoke_clears_token_even_on_failure() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("DELETE"))
        .and(path("/v1/access_tokens/current"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.revoke_token().await;
    assert!(result.is_err());
    assert!(!client.has_token());
}

// ── Device tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "3b0021000747343232363230",
                "name": "cloud-switch",
                "connected": true
            },
            {
                "id": "44002d000447343233323032",
                "name": null,
                "connected": false
            }
        ])))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "3b0021000747343232363230");
    assert_eq!(devices[0].name.as_deref(), Some("cloud-switch"));
    assert!(devices[0].connected);
    assert!(devices[1].name.is_none());
    assert!(!devices[1].connected);
}

#[tokio::test]
async fn test_list_devices_without_token() {
    let (_server, client) = setup().await;

    let result = client.list_devices().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_get_device_includes_functions() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("GET"))
        .and(path("/v1/devices/3b0021000747343232363230"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "3b0021000747343232363230",
            "name": "cloud-switch",
            "connected": true,
            "functions": ["sendtristate"]
        })))
        .mount(&server)
        .await;

    let device = client.get_device("3b0021000747343232363230").await.unwrap();
    assert_eq!(device.functions, vec!["sendtristate"]);
}

// ── Function call tests ─────────────────────────────────────────────

#[tokio::test]
async fn test_call_function_success() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("POST"))
        .and(path("/v1/devices/3b0021/sendtristate"))
        .and(body_string_contains("arg=10F0F0FF0101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "3b0021",
            "connected": true,
            "return_value": 1
        })))
        .mount(&server)
        .await;

    let rv = client
        .call_function("3b0021", "sendtristate", "10F0F0FF0101")
        .await
        .unwrap();
    assert_eq!(rv, 1);
}

#[tokio::test]
async fn test_call_function_offline_device() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("POST"))
        .and(path("/v1/devices/3b0021/sendtristate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "3b0021",
            "connected": false,
            "return_value": 0
        })))
        .mount(&server)
        .await;

    let result = client.call_function("3b0021", "sendtristate", "1").await;
    assert!(matches!(result, Err(Error::FunctionCall { .. })));
}

#[tokio::test]
async fn test_call_function_firmware_rejection() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("POST"))
        .and(path("/v1/devices/3b0021/sendtristate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "3b0021",
            "connected": true,
            "return_value": -1
        })))
        .mount(&server)
        .await;

    let result = client.call_function("3b0021", "sendtristate", "zzz").await;

    match result {
        Err(Error::FunctionCall { ref message, .. }) => {
            assert!(message.contains("-1"), "expected return value in message: {message}");
        }
        other => panic!("expected FunctionCall error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_body_is_a_deserialization_error() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    // Proxy/gateway error pages can put a multibyte character right at
    // the preview truncation point; the error must still come back as
    // Deserialization, not a panic.
    let mut body = "a".repeat(199);
    body.push('é');
    body.push_str(&"b".repeat(50));

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Error mapping tests ─────────────────────────────────────────────

#[tokio::test]
async fn test_expired_token_maps_to_token_expired() {
    let (server, client) = setup().await;
    client.set_token(secret("stale"));

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_token"
        })))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    assert!(matches!(result, Err(Error::TokenExpired)));
}

#[tokio::test]
async fn test_server_error_maps_to_api() {
    let (server, client) = setup().await;
    client.set_token(secret("tok"));

    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    assert!(matches!(result, Err(Error::Api { status: 500, .. })));
}
