//! Async client for the Particle device cloud.
//!
//! Raw HTTP surface only: OAuth password-grant login, device listing,
//! cloud function calls, and the server-sent-events stream. Domain
//! semantics (session state, switch bank) live in `cloudswitch-core`.

pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod transport;

pub use client::CloudClient;
pub use error::Error;
pub use events::{EventStreamHandle, ReconnectConfig, SseEvent};
pub use models::{AccessToken, FunctionResponse, ParticleDevice};
pub use transport::TransportConfig;
