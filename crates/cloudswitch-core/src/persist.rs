// ── Persistence seam ──
//
// The session persists the selected device id and the switch bank so
// both survive restarts. StateStore keeps the storage mechanism out of
// the session: the TOML-backed implementation lives in
// cloudswitch-config, MemoryStateStore backs tests.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{DeviceId, SwitchBank};

/// Everything the session persists across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    /// The last-selected cloud switch device, if any.
    pub selected_device: Option<DeviceId>,

    /// Per-slot switch names and tristate codes.
    #[serde(default)]
    pub bank: SwitchBank,
}

/// Storage backend for [`SavedState`].
///
/// Implementations must tolerate a missing backing store on `load`
/// (return the default state, not an error).
pub trait StateStore: Send + Sync {
    fn load(&self) -> Result<SavedState, CoreError>;
    fn save(&self, state: &SavedState) -> Result<(), CoreError>;
}

/// Sharing a store between a session and another observer.
impl<S: StateStore + ?Sized> StateStore for std::sync::Arc<S> {
    fn load(&self) -> Result<SavedState, CoreError> {
        (**self).load()
    }

    fn save(&self, state: &SavedState) -> Result<(), CoreError> {
        (**self).save(state)
    }
}

// ── In-memory store ─────────────────────────────────────────────────

/// In-memory [`StateStore`] for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<SavedState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed the store, e.g. with a previously-selected device.
    pub fn with_state(state: SavedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<SavedState, CoreError> {
        Ok(self.state.lock().expect("state lock poisoned").clone())
    }

    fn save(&self, state: &SavedState) -> Result<(), CoreError> {
        *self.state.lock().expect("state lock poisoned") = state.clone();
        Ok(())
    }
}
