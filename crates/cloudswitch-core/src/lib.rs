//! Domain layer between `cloudswitch-api` and consumers (CLI, automation).
//!
//! This crate owns the session state machine and switch model for the
//! cloudswitch workspace:
//!
//! - **[`Session`]** — Central facade managing the full lifecycle:
//!   [`login()`](Session::login) authenticates against the device cloud and
//!   populates the device list; [`toggle_switch()`](Session::toggle_switch)
//!   replays a stored RF code through the selected device;
//!   [`start_listen()`](Session::start_listen) bridges the device's event
//!   stream into [`SessionEvent::CodeReceived`] notifications.
//!   [`Session::oneshot()`](Session::oneshot) provides a lightweight
//!   login-run-logout mode for single CLI invocations.
//!
//! - **[`SwitchBank`]** — The five name/tristate-code slots the firmware
//!   drives, with the parallel-array invariant enforced by construction.
//!
//! - **[`SessionEvent`]** — State-change notifications delivered over a
//!   `tokio::sync::broadcast` channel vended by
//!   [`Session::subscribe()`](Session::subscribe).
//!
//! - **[`StateStore`]** — Persistence seam behind device restore and switch
//!   configuration. The TOML-backed implementation lives in
//!   `cloudswitch-config`; [`MemoryStateStore`] backs tests.

pub mod error;
pub mod events;
pub mod model;
pub mod persist;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::CoreError;
pub use events::SessionEvent;
pub use model::{CloudDevice, DeviceId, SwitchBank, SwitchDevice, TristateCode, SWITCH_COUNT};
pub use persist::{MemoryStateStore, SavedState, StateStore};
pub use session::{Session, SessionConfig};
