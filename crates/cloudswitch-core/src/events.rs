// ── Session event notifications ──
//
// The session notifies observers through a broadcast channel rather
// than a single registered delegate: any number of consumers can hold
// a receiver without owning the session, and a dropped receiver can
// never dangle.

use crate::model::TristateCode;

/// State-change notifications emitted by [`Session`](crate::Session).
///
/// Subscribe via [`Session::subscribe()`](crate::Session::subscribe).
/// Events are delivered on whatever task polls the receiver; the
/// session imposes no main-thread requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login or logout completed.
    AuthenticationChanged,

    /// The selected device, its reachability, or the switch bank changed.
    SwitchStateChanged,

    /// The RF listener received a tristate code from the device.
    CodeReceived(TristateCode),
}
