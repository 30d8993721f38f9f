// Particle cloud HTTP client
//
// Wraps `reqwest::Client` with cloud-specific URL construction, bearer
// token management, and error envelope parsing. Every method returns
// the unwrapped JSON payload -- callers never see the error envelope.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{AccessToken, ApiErrorBody, FunctionResponse, ParticleDevice, TokenResponse};
use crate::transport::TransportConfig;

/// OAuth client id/secret pair for password-grant login.
///
/// The cloud accepts this well-known public pair for first-party tools;
/// it identifies the client, not the user.
const OAUTH_CLIENT: (&str, &str) = ("particle", "particle");

/// Raw HTTP client for the Particle device cloud.
///
/// Holds the base URL and the current bearer token. Cheaply shareable
/// behind an `Arc`; the token is interior-mutable so a re-login can
/// rotate it without rebuilding the client.
pub struct CloudClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl CloudClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// The `base_url` is the cloud API root (`https://api.particle.io`
    /// for the hosted cloud). The client starts without a token; call
    /// [`login`](Self::login) or [`set_token`](Self::set_token).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            token: RwLock::new(None),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// Used by tests to point at a mock server.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// The cloud API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client (for the event stream, which shares it).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Token management ─────────────────────────────────────────────

    /// Install a bearer token (from login or a restored session).
    pub fn set_token(&self, token: SecretString) {
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    /// Drop the stored bearer token.
    pub fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    /// Returns `true` if a bearer token is installed.
    pub fn has_token(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    /// The current bearer token, if any (for the event stream, which
    /// authenticates its own long-lived request).
    pub fn token(&self) -> Option<SecretString> {
        self.token.read().expect("token lock poisoned").clone()
    }

    /// Apply the stored bearer token to a request builder.
    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, Error> {
        let guard = self.token.read().expect("token lock poisoned");
        match guard.as_ref() {
            Some(token) => Ok(builder.bearer_auth(token.expose_secret())),
            None => Err(Error::Authentication {
                message: "no access token -- login first".into(),
            }),
        }
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Authenticate with username/password via the OAuth password grant.
    ///
    /// `POST /oauth/token` with the public client pair as basic auth.
    /// On success the returned token is also installed on this client.
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AccessToken, Error> {
        let url = self.base_url.join("oauth/token").map_err(Error::InvalidUrl)?;

        debug!("logging in at {}", url);

        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password.expose_secret()),
        ];

        let resp = self
            .http
            .post(url)
            .basic_auth(OAUTH_CLIENT.0, Some(OAUTH_CLIENT.1))
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = parse_error_message(&body)
                .unwrap_or_else(|| format!("login failed (HTTP {status})"));
            return Err(Error::Authentication { message });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            }
        })?;

        let access = AccessToken {
            token: SecretString::from(token.access_token),
            expires_in: token.expires_in,
        };
        self.set_token(access.token.clone());

        debug!("login successful");
        Ok(access)
    }

    /// Revoke the current access token.
    ///
    /// `DELETE /v1/access_tokens/current`. The stored token is cleared
    /// regardless of whether the revoke succeeded -- a failed revoke
    /// must not leave the client half logged in.
    pub async fn revoke_token(&self) -> Result<(), Error> {
        let url = self
            .base_url
            .join("v1/access_tokens/current")
            .map_err(Error::InvalidUrl)?;

        debug!("revoking access token");

        let result = async {
            let builder = self.apply_auth(self.http.delete(url))?;
            let resp = builder.send().await.map_err(Error::Transport)?;
            self.check_status(&resp)?;
            Ok(())
        }
        .await;

        self.clear_token();
        result
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// List all devices claimed by the authenticated account.
    ///
    /// `GET /v1/devices`
    pub async fn list_devices(&self) -> Result<Vec<ParticleDevice>, Error> {
        debug!("listing devices");
        self.get("v1/devices").await
    }

    /// Get a single device by id.
    ///
    /// `GET /v1/devices/{id}` -- unlike the list endpoint, this includes
    /// the device's exposed cloud functions when it is online.
    pub async fn get_device(&self, device_id: &str) -> Result<ParticleDevice, Error> {
        debug!(device_id, "fetching device");
        self.get(&format!("v1/devices/{device_id}")).await
    }

    // ── Cloud functions ──────────────────────────────────────────────

    /// Call a cloud function on a device.
    ///
    /// `POST /v1/devices/{id}/{function}` with a form-encoded `arg`.
    /// The device firmware returns a negative value to reject the call;
    /// that and an offline device both map to [`Error::FunctionCall`].
    pub async fn call_function(
        &self,
        device_id: &str,
        function: &str,
        arg: &str,
    ) -> Result<i64, Error> {
        let url = self
            .base_url
            .join(&format!("v1/devices/{device_id}/{function}"))
            .map_err(Error::InvalidUrl)?;

        debug!(device_id, function, "calling cloud function");

        let builder = self.apply_auth(self.http.post(url).form(&[("arg", arg)]))?;
        let resp = builder.send().await.map_err(Error::Transport)?;
        self.check_status(&resp)?;

        let body = resp.text().await.map_err(Error::Transport)?;
        let result: FunctionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            }
        })?;

        if !result.connected {
            return Err(Error::FunctionCall {
                device_id: device_id.to_owned(),
                message: "device is offline".into(),
            });
        }
        if result.return_value < 0 {
            return Err(Error::FunctionCall {
                device_id: device_id.to_owned(),
                message: format!("firmware rejected the call (returned {})", result.return_value),
            });
        }

        Ok(result.return_value)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated GET and deserialize the JSON body.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.base_url.join(path).map_err(Error::InvalidUrl)?;
        debug!("GET {}", url);

        let builder = self.apply_auth(self.http.get(url))?;
        let resp = builder.send().await.map_err(Error::Transport)?;
        self.check_status(&resp)?;

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| {
            // Truncate by characters, not bytes -- a byte slice could
            // split a multibyte character and panic.
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }

    /// Map non-2xx statuses to typed errors. Consumes nothing; the
    /// caller still owns the response body on success.
    fn check_status(&self, resp: &reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::TokenExpired);
        }
        if !status.is_success() {
            return Err(Error::Api {
                message: format!("HTTP {status}"),
                code: None,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Extract a human-readable message from the cloud error envelope.
///
/// Handles both `{error, error_description}` and `{ok: false, error}`.
fn parse_error_message(body: &str) -> Option<String> {
    let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
    if parsed.ok == Some(false) {
        return parsed.error;
    }
    parsed
        .error_description
        .or(parsed.error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_oauth_shape() {
        let body = r#"{"error":"invalid_grant","error_description":"User credentials are invalid"}"#;
        assert_eq!(
            parse_error_message(body).as_deref(),
            Some("User credentials are invalid")
        );
    }

    #[test]
    fn error_message_from_ok_false_shape() {
        let body = r#"{"ok":false,"error":"Permission Denied"}"#;
        assert_eq!(parse_error_message(body).as_deref(), Some("Permission Denied"));
    }

    #[test]
    fn error_message_from_garbage() {
        assert!(parse_error_message("<html>nope</html>").is_none());
    }
}
