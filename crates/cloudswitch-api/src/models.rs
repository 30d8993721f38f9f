// Wire types for the Particle cloud REST API.
//
// These mirror the JSON the cloud actually sends; cloudswitch-core
// converts them into canonical domain types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ── Authentication ──────────────────────────────────────────────────

/// OAuth token response from `POST /oauth/token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A bearer token for the cloud API.
///
/// The token string is secrecy-wrapped so it never appears in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    /// Token lifetime in seconds, if the cloud reported one.
    pub expires_in: Option<u64>,
}

// ── Devices ─────────────────────────────────────────────────────────

/// A device as listed by `GET /v1/devices`.
///
/// Only the fields the session layer needs are typed; everything else
/// the cloud sends is ignored. `functions` is only present on the
/// detail endpoint for online devices, hence the default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleDevice {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub functions: Vec<String>,
}

// ── Function calls ──────────────────────────────────────────────────

/// Response from `POST /v1/devices/{id}/{function}`.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub return_value: i64,
}

// ── Error envelope ──────────────────────────────────────────────────

/// Error body the cloud returns on non-2xx responses:
/// `{ "error": "invalid_grant", "error_description": "..." }`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    /// Some endpoints use `{ "ok": false, "error": "..." }` instead.
    #[serde(default)]
    pub ok: Option<bool>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_tolerates_missing_fields() {
        let json = r#"{ "id": "3b0021000747343232363230" }"#;
        let device: ParticleDevice = serde_json::from_str(json).unwrap();
        assert_eq!(device.id, "3b0021000747343232363230");
        assert!(device.name.is_none());
        assert!(!device.connected);
        assert!(device.functions.is_empty());
    }

    #[test]
    fn device_full_shape() {
        let json = r#"{
            "id": "3b0021000747343232363230",
            "name": "cloud-switch",
            "connected": true,
            "functions": ["sendtristate"],
            "last_heard": "2026-02-10T12:00:00Z"
        }"#;
        let device: ParticleDevice = serde_json::from_str(json).unwrap();
        assert_eq!(device.name.as_deref(), Some("cloud-switch"));
        assert!(device.connected);
        assert_eq!(device.functions, vec!["sendtristate"]);
    }

    #[test]
    fn function_response_shape() {
        let json = r#"{ "id": "abc", "connected": true, "return_value": 1 }"#;
        let resp: FunctionResponse = serde_json::from_str(json).unwrap();
        assert!(resp.connected);
        assert_eq!(resp.return_value, 1);
    }
}
