//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use cloudswitch_config::ConfigError;
use cloudswitch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(cloudswitch::auth_failed),
        help("Verify your account credentials, then run: cloudswitch login")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured")]
    #[diagnostic(
        code(cloudswitch::no_credentials),
        help(
            "Store credentials with: cloudswitch login\n\
             Or set CLOUDSWITCH_USERNAME and CLOUDSWITCH_PASSWORD."
        )
    )]
    NoCredentials,

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{identifier}' not found")]
    #[diagnostic(
        code(cloudswitch::device_not_found),
        help("Run: cloudswitch devices list")
    )]
    DeviceNotFound { identifier: String },

    #[error("No cloud switch device selected")]
    #[diagnostic(
        code(cloudswitch::no_device),
        help("Select one with: cloudswitch devices select <DEVICE>")
    )]
    NoDeviceSelected,

    #[error("Device '{identifier}' is not reachable")]
    #[diagnostic(
        code(cloudswitch::device_unreachable),
        help("The device is offline. Check its power and network connection.")
    )]
    DeviceUnreachable { identifier: String },

    // ── Switches ─────────────────────────────────────────────────────
    #[error("Switch index {index} out of range (bank holds {count})")]
    #[diagnostic(
        code(cloudswitch::bad_index),
        help("Valid indices run from 0 up to (but not including) {count}.")
    )]
    SwitchIndexOutOfRange { index: usize, count: usize },

    #[error("Switch {index} has no RF code assigned")]
    #[diagnostic(
        code(cloudswitch::unconfigured),
        help(
            "Assign one with: cloudswitch switches set {index} --code <CODE>\n\
             Or capture one from a remote: cloudswitch listen --learn {index}"
        )
    )]
    SwitchNotConfigured { index: usize },

    #[error("Invalid tristate code '{code}'")]
    #[diagnostic(
        code(cloudswitch::bad_code),
        help("Tristate codes use only the symbols 0, 1, and F.")
    )]
    InvalidCode { code: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot reach the device cloud")]
    #[diagnostic(
        code(cloudswitch::connection_failed),
        help("Check your network connection and the configured api_url.")
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Timed out waiting for an RF code")]
    #[diagnostic(
        code(cloudswitch::listen_timeout),
        help("Press the remote button while listening, or raise --timeout.")
    )]
    ListenTimeout,

    // ── Generic ──────────────────────────────────────────────────────
    #[error("Cloud API error: {message}")]
    #[diagnostic(code(cloudswitch::api_error))]
    ApiError { message: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cloudswitch::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(cloudswitch::config))]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to a process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials => exit_code::AUTH,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConnectionFailed { .. } | Self::DeviceUnreachable { .. } => {
                exit_code::CONNECTION
            }
            Self::ListenTimeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::SwitchIndexOutOfRange { .. }
            | Self::InvalidCode { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::NotAuthenticated => CliError::AuthFailed {
                message: "not logged in".into(),
            },
            CoreError::LoginInProgress => CliError::AuthFailed {
                message: "a login is already in progress".into(),
            },
            CoreError::DeviceNotFound { id } => CliError::DeviceNotFound { identifier: id },
            CoreError::NoDeviceSelected => CliError::NoDeviceSelected,
            CoreError::DeviceUnreachable { id } => CliError::DeviceUnreachable { identifier: id },
            CoreError::SwitchIndexOutOfRange { index, count } => {
                CliError::SwitchIndexOutOfRange { index, count }
            }
            CoreError::SwitchNotConfigured { index } => CliError::SwitchNotConfigured { index },
            CoreError::InvalidTristateCode { code } => CliError::InvalidCode { code },
            CoreError::State { message } => CliError::Config { message },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed {
                source: reason.into(),
            },
            CoreError::Api { message, status: _ } => CliError::ApiError { message },
        }
    }
}

// ── ConfigError → CliError ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials => CliError::NoCredentials,
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        let auth: CliError = CoreError::NotAuthenticated.into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let missing: CliError = CoreError::DeviceNotFound { id: "x".into() }.into();
        assert_eq!(missing.exit_code(), exit_code::NOT_FOUND);

        let range: CliError = CoreError::SwitchIndexOutOfRange { index: 9, count: 5 }.into();
        assert_eq!(range.exit_code(), exit_code::USAGE);

        let offline: CliError = CoreError::DeviceUnreachable { id: "x".into() }.into();
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);
    }
}
