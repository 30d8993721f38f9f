//! Configuration for the cloudswitch CLI.
//!
//! TOML config file + `CLOUDSWITCH_` environment overrides, credential
//! resolution (env + keyring + plaintext), and the TOML-backed
//! [`StateStore`] the session persists its device selection and switch
//! bank through.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use cloudswitch_api::TransportConfig;
use cloudswitch_core::{CoreError, SavedState, SessionConfig, StateStore};

/// Keyring service name for stored passwords.
const KEYRING_SERVICE: &str = "cloudswitch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured -- set CLOUDSWITCH_USERNAME/CLOUDSWITCH_PASSWORD, \
             store them with 'cloudswitch login', or add them to the config file")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Cloud API root URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Account username (email).
    pub username: Option<String>,

    /// Account password (plaintext -- prefer the keyring or env var).
    pub password: Option<String>,

    /// Output and transport defaults.
    #[serde(default)]
    pub defaults: Defaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            username: None,
            password: None,
            defaults: Defaults::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.particle.io/".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "cloudswitch", "cloudswitch").map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Resolve the saved-state file path (device selection + switch bank).
pub fn state_path() -> PathBuf {
    ProjectDirs::from("io", "cloudswitch", "cloudswitch").map_or_else(
        || dirs_fallback().join("state.toml"),
        |dirs| dirs.data_dir().join("state.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cloudswitch");
    p
}

// ── Config loading / saving ─────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CLOUDSWITCH_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning the defaults if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve account credentials from the chain: env, keyring, config.
///
/// The username comes from the config file or `CLOUDSWITCH_USERNAME`.
/// The password is looked up in order: `CLOUDSWITCH_PASSWORD`, the
/// system keyring, plaintext in the config file.
pub fn resolve_credentials(config: &Config) -> Result<(String, SecretString), ConfigError> {
    let username = config
        .username
        .clone()
        .or_else(|| std::env::var("CLOUDSWITCH_USERNAME").ok())
        .ok_or(ConfigError::NoCredentials)?;

    // 1. Env var
    if let Ok(pw) = std::env::var("CLOUDSWITCH_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &username) {
        if let Ok(pw) = entry.get_password() {
            debug!("password resolved from keyring");
            return Ok((username, SecretString::from(pw)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = config.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials)
}

/// Store a password in the system keyring.
pub fn store_password(username: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)?;
    entry.set_password(password)?;
    Ok(())
}

/// Remove a stored password from the system keyring.
///
/// A missing entry is not an error.
pub fn clear_password(username: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, username)?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ── Session config ──────────────────────────────────────────────────

/// Build a `SessionConfig` from the loaded configuration.
pub fn session_config(config: &Config) -> Result<SessionConfig, ConfigError> {
    let api_url: url::Url = config
        .api_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", config.api_url),
        })?;

    Ok(SessionConfig {
        api_url,
        transport: TransportConfig {
            timeout: Duration::from_secs(config.defaults.timeout),
        },
        ..SessionConfig::default()
    })
}

// ── TOML state store ────────────────────────────────────────────────

/// [`StateStore`] backed by a TOML file on disk.
///
/// A missing file loads as the default state; an unparseable file is
/// an error so a typo in a hand-edited file is not silently discarded.
#[derive(Debug, Clone)]
pub struct TomlStateStore {
    path: PathBuf,
}

impl TomlStateStore {
    /// Store at the platform-default state path.
    pub fn new() -> Self {
        Self { path: state_path() }
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Default for TomlStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for TomlStateStore {
    fn load(&self) -> Result<SavedState, CoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved state file");
                return Ok(SavedState::default());
            }
            Err(e) => {
                return Err(CoreError::State {
                    message: format!("cannot read {}: {e}", self.path.display()),
                });
            }
        };

        toml::from_str(&raw).map_err(|e| CoreError::State {
            message: format!("cannot parse {}: {e}", self.path.display()),
        })
    }

    fn save(&self, state: &SavedState) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::State {
                message: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let toml_str = toml::to_string_pretty(state).map_err(|e| CoreError::State {
            message: format!("cannot serialize state: {e}"),
        })?;

        std::fs::write(&self.path, toml_str).map_err(|e| CoreError::State {
            message: format!("cannot write {}: {e}", self.path.display()),
        })
    }
}
