// ── Core error types ──
//
// User-facing errors from cloudswitch-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<cloudswitch_api::Error>` impl translates transport-layer
// errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication errors ────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("A login is already in progress")]
    LoginInProgress,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device not found: {id}")]
    DeviceNotFound { id: String },

    #[error("No cloud switch device selected")]
    NoDeviceSelected,

    #[error("Device {id} is not reachable")]
    DeviceUnreachable { id: String },

    // ── Switch errors ────────────────────────────────────────────────
    #[error("Switch index {index} out of range (bank holds {count})")]
    SwitchIndexOutOfRange { index: usize, count: usize },

    #[error("Switch {index} has no RF code assigned")]
    SwitchNotConfigured { index: usize },

    #[error("Invalid tristate code '{code}': only 0, 1, and F symbols are allowed")]
    InvalidTristateCode { code: String },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("State store error: {message}")]
    State { message: String },

    // ── Connection / API errors (wrapped, not exposed raw) ───────────
    #[error("Cannot reach the device cloud: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Cloud API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cloudswitch_api::Error> for CoreError {
    fn from(err: cloudswitch_api::Error) -> Self {
        match err {
            cloudswitch_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            cloudswitch_api::Error::TokenExpired => CoreError::AuthenticationFailed {
                message: "access token expired -- log in again".into(),
            },
            cloudswitch_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            cloudswitch_api::Error::InvalidUrl(e) => CoreError::Api {
                message: format!("invalid URL: {e}"),
                status: None,
            },
            cloudswitch_api::Error::Timeout { timeout_secs } => CoreError::ConnectionFailed {
                reason: format!("request timed out after {timeout_secs}s"),
            },
            cloudswitch_api::Error::Api {
                message, status, ..
            } => CoreError::Api {
                message,
                status: Some(status),
            },
            cloudswitch_api::Error::FunctionCall { device_id, message } => {
                if message.contains("offline") {
                    CoreError::DeviceUnreachable { id: device_id }
                } else {
                    CoreError::Api {
                        message: format!("device {device_id}: {message}"),
                        status: None,
                    }
                }
            }
            cloudswitch_api::Error::EventStreamConnect(reason) => {
                CoreError::ConnectionFailed { reason }
            }
            cloudswitch_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("unexpected cloud response: {message}"),
                status: None,
            },
        }
    }
}
