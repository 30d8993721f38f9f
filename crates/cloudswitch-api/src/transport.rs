// Shared transport configuration for building reqwest::Client instances.
//
// The REST client and the SSE event stream share timeout and user-agent
// settings through this module. The cloud API sits behind a public TLS
// endpoint, so no certificate knobs are exposed here.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("cloudswitch/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Transport)
    }

    /// Build a client without a request timeout.
    ///
    /// The SSE event stream holds a single GET open indefinitely; a
    /// whole-request timeout would sever it after `timeout` elapses.
    /// Connection establishment still times out.
    pub fn build_streaming_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(Error::Transport)
    }
}
