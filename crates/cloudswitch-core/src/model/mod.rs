//! Canonical domain types for the session layer.

pub mod device;
pub mod switch_bank;

pub use device::{CloudDevice, DeviceId, SwitchDevice};
pub use switch_bank::{SwitchBank, TristateCode, SWITCH_COUNT};
