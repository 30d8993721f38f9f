// Session integration tests against a mock cloud.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cloudswitch_api::CloudClient;
use cloudswitch_core::{
    CoreError, DeviceId, MemoryStateStore, SavedState, Session, SessionConfig, SessionEvent,
    StateStore, TristateCode,
};

const DEVICE_ID: &str = "3b0021000747343232363230";

async fn mock_session(server: &MockServer) -> (Session, Arc<MemoryStateStore>) {
    mock_session_with_state(server, SavedState::default()).await
}

async fn mock_session_with_state(
    server: &MockServer,
    saved: SavedState,
) -> (Session, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::with_state(saved));
    let client = CloudClient::with_client(
        reqwest::Client::new(),
        server.uri().parse().unwrap(),
    );
    let session = Session::with_client(
        SessionConfig::default(),
        client,
        Box::new(Arc::clone(&store)),
    );
    (session, store)
}

fn password() -> SecretString {
    SecretString::from("hunter2")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "bearer",
            "access_token": "b18d8a2e-token",
            "expires_in": 7_776_000,
        })))
        .mount(server)
        .await;
}

async fn mount_device_list(server: &MockServer, connected: bool) {
    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": DEVICE_ID, "name": "cloud-switch", "connected": connected},
            {"id": "44002d000747343232363230", "name": "spare", "connected": false},
        ])))
        .mount(server)
        .await;
}

async fn login(session: &Session) {
    session.login("jp@example.com", &password()).await.unwrap();
}

// ── Authentication ───────────────────────────────────────────────────

#[tokio::test]
async fn login_populates_devices_and_notifies_once() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;

    let (session, _) = mock_session(&server).await;
    let mut rx = session.subscribe();

    login(&session).await;

    assert!(session.is_authenticated());
    let devices = session.available_devices();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id.as_str(), DEVICE_ID);
    assert!(devices[0].reachable);

    assert_eq!(rx.try_recv().unwrap(), SessionEvent::AuthenticationChanged);
    assert!(rx.try_recv().is_err(), "exactly one event expected");
}

#[tokio::test]
async fn failed_login_leaves_session_logged_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "User credentials are invalid",
        })))
        .mount(&server)
        .await;

    let (session, _) = mock_session(&server).await;
    let mut rx = session.subscribe();

    let result = session.login("jp@example.com", &password()).await;
    assert!(matches!(
        result,
        Err(CoreError::AuthenticationFailed { ref message })
            if message.contains("credentials")
    ));
    assert!(!session.is_authenticated());
    assert!(session.available_devices().is_empty());
    assert!(rx.try_recv().is_err(), "failed login must not notify");
}

#[tokio::test]
async fn overlapping_login_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({
                    "token_type": "bearer",
                    "access_token": "slow-token",
                    "expires_in": 7_776_000,
                })),
        )
        .mount(&server)
        .await;
    mount_device_list(&server, true).await;

    let (session, _) = mock_session(&server).await;

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.login("jp@example.com", &password()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = session.login("jp@example.com", &password()).await;
    assert!(matches!(second, Err(CoreError::LoginInProgress)));

    first.await.unwrap().unwrap();
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn logout_clears_state_and_notifies() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;
    Mock::given(method("DELETE"))
        .and(path("/v1/access_tokens/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();

    let mut rx = session.subscribe();
    session.logout().await;

    assert!(!session.is_authenticated());
    assert!(session.available_devices().is_empty());
    assert!(session.selected_device().is_none());
    assert_eq!(rx.try_recv().unwrap(), SessionEvent::AuthenticationChanged);
}

#[tokio::test]
async fn logout_survives_revoke_failure() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;
    Mock::given(method("DELETE"))
        .and(path("/v1/access_tokens/current"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;

    session.logout().await;
    assert!(!session.is_authenticated());
}

// ── Device selection ─────────────────────────────────────────────────

#[tokio::test]
async fn select_device_persists_and_notifies() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;

    let (session, store) = mock_session(&server).await;
    login(&session).await;
    let mut rx = session.subscribe();

    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();

    let selected = session.selected_device().unwrap();
    assert_eq!(selected.id.as_str(), DEVICE_ID);
    assert_eq!(rx.try_recv().unwrap(), SessionEvent::SwitchStateChanged);
    assert_eq!(
        store.load().unwrap().selected_device,
        Some(DeviceId::new(DEVICE_ID))
    );
}

#[tokio::test]
async fn select_unknown_device_keeps_previous_selection() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();

    let result = session.select_device(&DeviceId::new("ffffffffffffffffffffffff"));
    assert!(matches!(result, Err(CoreError::DeviceNotFound { .. })));
    assert_eq!(session.selected_device().unwrap().id.as_str(), DEVICE_ID);
}

#[tokio::test]
async fn restore_refreshes_device_from_cloud() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": DEVICE_ID,
            "name": "cloud-switch",
            "connected": true,
            "functions": ["sendtristate"],
        })))
        .mount(&server)
        .await;

    let saved = SavedState {
        selected_device: Some(DeviceId::new(DEVICE_ID)),
        ..SavedState::default()
    };
    let (session, _) = mock_session_with_state(&server, saved).await;
    login(&session).await;
    let mut rx = session.subscribe();

    session.restore_device().await.unwrap();

    let selected = session.selected_device().unwrap();
    assert!(selected.reachable);
    assert!(selected.has_switch_function);
    assert_eq!(rx.try_recv().unwrap(), SessionEvent::SwitchStateChanged);

    // Idempotent: a second restore with no change stays silent.
    session.restore_device().await.unwrap();
    assert!(rx.try_recv().is_err());
}

// ── Toggling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_replays_stored_code() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/devices/{DEVICE_ID}/sendtristate")))
        .and(body_string_contains("arg=10F0F0FF0101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": DEVICE_ID,
            "connected": true,
            "return_value": 1,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();
    session
        .update_switch(0, "Lamp", TristateCode::parse("10F0F0FF0101").unwrap())
        .unwrap();

    session.toggle_switch(0).await.unwrap();
}

#[tokio::test]
async fn toggle_unconfigured_slot_makes_no_request() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();

    let result = session.toggle_switch(1).await;
    assert!(matches!(
        result,
        Err(CoreError::SwitchNotConfigured { index: 1 })
    ));
}

#[tokio::test]
async fn toggle_unreachable_device_fails_locally() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, false).await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();
    session
        .update_switch(0, "Lamp", TristateCode::parse("10F").unwrap())
        .unwrap();

    let result = session.toggle_switch(0).await;
    assert!(matches!(result, Err(CoreError::DeviceUnreachable { .. })));
}

#[tokio::test]
async fn toggle_without_selection_fails() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session
        .update_switch(0, "Lamp", TristateCode::parse("10F").unwrap())
        .unwrap();

    let result = session.toggle_switch(0).await;
    assert!(matches!(result, Err(CoreError::NoDeviceSelected)));
}

// ── RF listener ──────────────────────────────────────────────────────

#[tokio::test]
async fn listen_bridges_published_codes() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;

    let sse_body = concat!(
        ":ok\n\n",
        "event: tristate\n",
        "data: {\"data\":\"10F0F0FF0101\",\"ttl\":60,\"coreid\":\"3b0021000747343232363230\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}/events/tristate")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();

    let mut rx = session.subscribe();
    // select_device already notified; drain it.
    while rx.try_recv().is_ok() {}

    session.start_listen().unwrap();
    assert!(session.is_listening());

    // Second start is a no-op.
    session.start_listen().unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(SessionEvent::CodeReceived(code)) = rx.recv().await {
                break code;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(received.as_str(), "10F0F0FF0101");

    session.stop_listen();
    assert!(!session.is_listening());
}

#[tokio::test]
async fn start_then_stop_immediately_leaves_idle_listener() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    mount_device_list(&server, true).await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{DEVICE_ID}/events/tristate")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(":ok\n\n", "text/event-stream"),
        )
        .mount(&server)
        .await;

    let (session, _) = mock_session(&server).await;
    login(&session).await;
    session.select_device(&DeviceId::new(DEVICE_ID)).unwrap();

    session.start_listen().unwrap();
    session.stop_listen();
    assert!(!session.is_listening());

    let mut rx = session.subscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        !matches!(rx.try_recv(), Ok(SessionEvent::CodeReceived(_))),
        "stopped listener must not deliver codes"
    );
}
