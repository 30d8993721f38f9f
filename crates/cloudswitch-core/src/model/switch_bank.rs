// ── Switch bank model ──
//
// TristateCode and SwitchBank carry the per-switch configuration the
// firmware replays. The parallel-array invariant (names.len() ==
// codes.len() == SWITCH_COUNT) is enforced by construction: no public
// operation can produce a bank of any other shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Number of switch slots the firmware drives.
pub const SWITCH_COUNT: usize = 5;

// ── TristateCode ────────────────────────────────────────────────────

/// An RF tristate code: a string over the alphabet `{0, 1, F}`.
///
/// Each symbol encodes one tri-valued bit of the 433 MHz remote
/// protocol. The empty code marks an unassigned slot. Input is
/// normalized to uppercase (`f` → `F`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TristateCode(String);

impl TristateCode {
    /// Parse and normalize a tristate code.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let normalized = raw.as_ref().trim().to_uppercase();
        if normalized.chars().all(|c| matches!(c, '0' | '1' | 'F')) {
            Ok(Self(normalized))
        } else {
            Err(CoreError::InvalidTristateCode {
                code: raw.as_ref().to_owned(),
            })
        }
    }

    /// The empty code (unassigned slot).
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TristateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TristateCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TristateCode {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<TristateCode> for String {
    fn from(code: TristateCode) -> Self {
        code.0
    }
}

// ── SwitchBank ──────────────────────────────────────────────────────

/// The fixed bank of switch slots: parallel names and tristate codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawBank", into = "RawBank")]
pub struct SwitchBank {
    names: Vec<String>,
    codes: Vec<TristateCode>,
}

impl Default for SwitchBank {
    fn default() -> Self {
        Self {
            names: (1..=SWITCH_COUNT).map(|n| format!("Switch {n}")).collect(),
            codes: vec![TristateCode::empty(); SWITCH_COUNT],
        }
    }
}

impl SwitchBank {
    /// Number of slots. Always [`SWITCH_COUNT`].
    pub fn len(&self) -> usize {
        SWITCH_COUNT
    }

    /// A bank always has slots; provided for clippy symmetry.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn codes(&self) -> &[TristateCode] {
        &self.codes
    }

    /// The name/code pair at `index`.
    pub fn get(&self, index: usize) -> Result<(&str, &TristateCode), CoreError> {
        self.check_index(index)?;
        Ok((&self.names[index], &self.codes[index]))
    }

    /// Replace the name/code pair at `index`.
    pub fn set(
        &mut self,
        index: usize,
        name: impl Into<String>,
        code: TristateCode,
    ) -> Result<(), CoreError> {
        self.check_index(index)?;
        self.names[index] = name.into();
        self.codes[index] = code;
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), CoreError> {
        if index < SWITCH_COUNT {
            Ok(())
        } else {
            Err(CoreError::SwitchIndexOutOfRange {
                index,
                count: SWITCH_COUNT,
            })
        }
    }
}

/// Serde-facing shape. Deserialization normalizes whatever is on disk
/// back to exactly `SWITCH_COUNT` slots so a hand-edited or truncated
/// state file cannot break the invariant.
#[derive(Debug, Serialize, Deserialize)]
struct RawBank {
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    codes: Vec<String>,
}

impl From<RawBank> for SwitchBank {
    fn from(raw: RawBank) -> Self {
        let defaults = SwitchBank::default();
        let names = (0..SWITCH_COUNT)
            .map(|i| {
                raw.names
                    .get(i)
                    .filter(|n| !n.is_empty())
                    .cloned()
                    .unwrap_or_else(|| defaults.names[i].clone())
            })
            .collect();
        let codes = (0..SWITCH_COUNT)
            .map(|i| {
                raw.codes
                    .get(i)
                    .and_then(|c| TristateCode::parse(c).ok())
                    .unwrap_or_else(TristateCode::empty)
            })
            .collect();
        Self { names, codes }
    }
}

impl From<SwitchBank> for RawBank {
    fn from(bank: SwitchBank) -> Self {
        Self {
            names: bank.names,
            codes: bank.codes.into_iter().map(String::from).collect(),
        }
    }
}
