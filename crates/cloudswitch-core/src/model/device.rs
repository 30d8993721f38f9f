// ── Device identity and capability types ──
//
// DeviceId is the stable identifier the session keys everything on.
// SwitchDevice is the minimal capability interface the session requires
// from any cloud-provided device object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use cloudswitch_api::ParticleDevice;

/// The cloud function the firmware exposes for replaying RF codes.
pub(crate) const SWITCH_FUNCTION: &str = "sendtristate";

// ── DeviceId ────────────────────────────────────────────────────────

/// Stable device identifier, normalized to lowercase hex.
///
/// The cloud issues 24-character hex ids; normalization makes ids
/// comparable regardless of how the caller typed them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a normalized device id.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

// ── SwitchDevice capability ─────────────────────────────────────────

/// The minimal contract the session requires from a cloud device:
/// a stable id and an optional display name.
pub trait SwitchDevice {
    fn id(&self) -> &DeviceId;
    fn name(&self) -> Option<&str>;
}

// ── CloudDevice ─────────────────────────────────────────────────────

/// Canonical device type as the session sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudDevice {
    pub id: DeviceId,
    pub name: Option<String>,
    /// Whether the cloud currently reports the device online.
    pub reachable: bool,
    /// Whether the device exposes the switch firmware's cloud function.
    /// Only known after a detail fetch; the list endpoint omits functions.
    pub has_switch_function: bool,
}

impl CloudDevice {
    /// A placeholder for a previously-selected device that has not been
    /// seen from the cloud yet (offline restore).
    pub fn restored(id: DeviceId) -> Self {
        Self {
            id,
            name: None,
            reachable: false,
            has_switch_function: false,
        }
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

impl SwitchDevice for CloudDevice {
    fn id(&self) -> &DeviceId {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl From<ParticleDevice> for CloudDevice {
    fn from(raw: ParticleDevice) -> Self {
        let has_switch_function = raw.functions.iter().any(|f| f == SWITCH_FUNCTION);
        Self {
            id: DeviceId::new(raw.id),
            name: raw.name,
            reachable: raw.connected,
            has_switch_function,
        }
    }
}
