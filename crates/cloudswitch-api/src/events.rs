//! Server-sent-events stream with auto-reconnect.
//!
//! Connects to a device's event endpoint (`/v1/devices/{id}/events/{prefix}`)
//! and streams parsed events through a [`tokio::sync::broadcast`] channel.
//! Handles reconnection with exponential backoff + jitter automatically.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudswitch_api::events::{EventStreamHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let handle = EventStreamHandle::connect(
//!     http, url, token, ReconnectConfig::default(), cancel.clone(),
//! );
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}: {}", event.event, event.data);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── SseEvent ─────────────────────────────────────────────────────────

/// A parsed event from the cloud SSE stream.
///
/// The cloud sends `event:`/`data:` line pairs where `data:` carries a
/// JSON payload: `{"data":"...","ttl":60,"published_at":"...","coreid":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event name, e.g. `"tristate"` for a received RF code.
    pub event: String,

    /// The payload the device published (the `data` field of the JSON body).
    pub data: String,

    /// ISO-8601 publish timestamp from the cloud.
    pub published_at: Option<String>,

    /// Id of the device that published the event.
    pub coreid: Option<String>,
}

/// JSON body carried on an SSE `data:` line.
#[derive(Debug, Deserialize)]
struct SseDataBody {
    #[serde(default)]
    data: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    coreid: Option<String>,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for stream reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running SSE event stream.
///
/// Call [`subscribe`](Self::subscribe) for a receiver and
/// [`shutdown`](Self::shutdown) to tear down the background task.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<Arc<SseEvent>>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the stream task and return immediately.
    ///
    /// The first connection attempt happens asynchronously -- subscribe
    /// to the event receiver to start consuming events. `http` should be
    /// a streaming-capable client (no whole-request timeout).
    pub fn connect(
        http: reqwest::Client,
        url: Url,
        token: SecretString,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            sse_loop(http, url, token, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// Multiple consumers can subscribe concurrently. If a consumer falls
    /// behind, it receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SseEvent>> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
async fn sse_loop(
    http: reqwest::Client,
    url: Url,
    token: SecretString,
    event_tx: broadcast::Sender<Arc<SseEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&http, &url, &token, &event_tx, &cancel) => {
                match result {
                    // Clean disconnect (server closed the stream).
                    // Reset attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("event stream closed cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "event stream error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "event stream reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Hold one streaming GET open and dispatch frames until it drops.
async fn connect_and_read(
    http: &reqwest::Client,
    url: &Url,
    token: &SecretString,
    event_tx: &broadcast::Sender<Arc<SseEvent>>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to event stream");

    let resp = http
        .get(url.clone())
        .bearer_auth(token.expose_secret())
        .header("Accept", "text/event-stream")
        .send()
        .await
        .map_err(|e| Error::EventStreamConnect(e.to_string()))?;

    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::TokenExpired);
    }
    if !status.is_success() {
        return Err(Error::EventStreamConnect(format!("HTTP {status}")));
    }

    tracing::info!("event stream connected");

    let mut parser = SseParser::new();
    let mut body = resp.bytes_stream();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for frame in parser.push(&bytes) {
                            dispatch_frame(&frame, event_tx);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(Error::EventStreamConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("event stream ended");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Parse a frame's `data:` JSON and broadcast the event.
fn dispatch_frame(frame: &SseFrame, event_tx: &broadcast::Sender<Arc<SseEvent>>) {
    let body: SseDataBody = match serde_json::from_str(&frame.data) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse SSE data payload");
            return;
        }
    };

    let event = SseEvent {
        event: frame.event.clone(),
        data: body.data,
        published_at: body.published_at,
        coreid: body.coreid,
    };

    // Ignore send errors -- just means no active subscribers right now
    let _ = event_tx.send(Arc::new(event));
}

// ── Incremental SSE framing ──────────────────────────────────────────

/// A complete `event:`/`data:` pair, terminated by a blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseFrame {
    event: String,
    data: String,
}

/// Incremental parser for the SSE wire format.
///
/// Feed it raw chunks; it buffers partial lines across chunk boundaries
/// and yields complete frames. Comment lines (`:ok` keep-alives) and
/// fields other than `event`/`data` are ignored.
struct SseParser {
    line_buf: String,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    fn new() -> Self {
        Self {
            line_buf: String::new(),
            event: None,
            data: Vec::new(),
        }
    }

    /// Push a chunk of bytes, returning any frames completed by it.
    fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.line_buf.push_str(&String::from_utf8_lossy(bytes));

        let mut frames = Vec::new();
        while let Some(newline) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=newline).collect();
            if let Some(frame) = self.handle_line(line.trim_end_matches(['\n', '\r'])) {
                frames.push(frame);
            }
        }
        frames
    }

    fn handle_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            // Blank line terminates a frame.
            let event = self.event.take()?;
            let data = std::mem::take(&mut self.data).join("\n");
            return Some(SseFrame { event, data });
        }
        if line.starts_with(':') {
            // Comment / keep-alive.
            return None;
        }
        if let Some(value) = line.strip_prefix("event:") {
            self.event = Some(value.trim_start().to_owned());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.trim_start().to_owned());
        }
        None
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
#[allow(clippy::as_conversions, clippy::cast_possible_wrap)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        // Each step should roughly double (within jitter bounds)
        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn parser_single_frame() {
        let mut parser = SseParser::new();
        let frames = parser.push(
            b"event: tristate\ndata: {\"data\":\"10F0F0FF0101\",\"ttl\":60}\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tristate");
        assert_eq!(frames[0].data, r#"{"data":"10F0F0FF0101","ttl":60}"#);
    }

    #[test]
    fn parser_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: tri").is_empty());
        assert!(parser.push(b"state\ndata: {\"data\":\"1\"}").is_empty());
        let frames = parser.push(b"\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "tristate");
    }

    #[test]
    fn parser_ignores_keepalive_comments() {
        let mut parser = SseParser::new();
        let frames = parser.push(b":ok\n\n:keepalive\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn parser_handles_crlf() {
        let mut parser = SseParser::new();
        let frames = parser.push(b"event: tristate\r\ndata: {\"data\":\"F\"}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, r#"{"data":"F"}"#);
    }

    #[test]
    fn parser_blank_line_without_event_yields_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: {\"data\":\"x\"}\n\n").is_empty());
    }

    #[test]
    fn dispatch_parses_payload_fields() {
        let (tx, mut rx) = broadcast::channel(16);
        let frame = SseFrame {
            event: "tristate".into(),
            data: r#"{"data":"10F0F0FF0101","ttl":60,"published_at":"2026-02-10T12:00:00Z","coreid":"3b0021"}"#.into(),
        };

        dispatch_frame(&frame, &tx);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.event, "tristate");
        assert_eq!(event.data, "10F0F0FF0101");
        assert_eq!(event.published_at.as_deref(), Some("2026-02-10T12:00:00Z"));
        assert_eq!(event.coreid.as_deref(), Some("3b0021"));
    }

    #[test]
    fn dispatch_skips_malformed_payload() {
        let (tx, mut rx) = broadcast::channel::<Arc<SseEvent>>(16);
        let frame = SseFrame {
            event: "tristate".into(),
            data: "not json".into(),
        };

        dispatch_frame(&frame, &tx);

        assert!(rx.try_recv().is_err());
    }
}
