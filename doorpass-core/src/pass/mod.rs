//! Access passes and their per-method stores.

pub mod lifecycle;
pub mod store;

pub use lifecycle::{is_invalid, next_id, reclassify, Partition};
pub use store::PassStore;

use crate::morse::{self, MorseError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Unlock modality a pass is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Qr,
    Morse,
    Voice,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Qr, Method::Morse, Method::Voice];

    /// Wire name used in request bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Morse => "morse",
            Self::Voice => "voice",
        }
    }

    /// Human-readable name used in notices.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Qr => "QR Code",
            Self::Morse => "Morse Code",
            Self::Voice => "Voice",
        }
    }

    /// Whether passes for this method live in the lock's remote store.
    ///
    /// Voice passes exist only in dashboard memory.
    pub fn has_remote(&self) -> bool {
        !matches!(self, Self::Voice)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = crate::DoorPassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qr" => Ok(Self::Qr),
            "morse" => Ok(Self::Morse),
            "voice" => Ok(Self::Voice),
            other => Err(crate::DoorPassError::InvalidInput(format!(
                "unknown method: {}",
                other
            ))),
        }
    }
}

/// How many times a pass may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassType {
    #[serde(rename = "one-time")]
    OneTime,
    #[serde(rename = "multiple-pass", alias = "multiple-use")]
    MultiplePass,
}

impl PassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::MultiplePass => "multiple-pass",
        }
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassType {
    type Err = crate::DoorPassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "one-time" => Ok(Self::OneTime),
            "multiple-pass" | "multiple-use" => Ok(Self::MultiplePass),
            other => Err(crate::DoorPassError::InvalidInput(format!(
                "unknown pass type: {}",
                other
            ))),
        }
    }
}

/// Why a pass sits in the invalid partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvalidStatus {
    Deleted,
    Expired,
}

impl InvalidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "Deleted",
            Self::Expired => "Expired",
        }
    }
}

/// Knock credential data carried by Morse passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorseCredential {
    /// Full seven-unit sequence, terminator included.
    pub morse_password: String,
    /// Six-bit binary password derived from the sequence.
    pub binary_password: String,
    /// Display form: the sequence without its terminator.
    pub knock_password: String,
}

impl MorseCredential {
    /// Derive the binary and knock forms from a complete sequence.
    pub fn from_sequence(sequence: &str) -> Result<Self, MorseError> {
        let encoded = morse::encode(sequence)?;
        Ok(Self {
            morse_password: sequence.to_string(),
            binary_password: encoded.binary,
            knock_password: encoded.knock,
        })
    }
}

/// Method-specific credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Credential {
    #[default]
    None,
    Qr {
        /// Opaque token encoded in the QR image, issued by the lock.
        password: Option<String>,
        creation_time: Option<NaiveDateTime>,
    },
    Morse(MorseCredential),
}

/// A single access pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub id: u64,
    pub name: String,
    pub pass_type: PassType,
    pub expiry_time: NaiveDateTime,
    pub deletion_time: Option<NaiveDateTime>,
    pub credential: Credential,
}

impl Pass {
    /// Status shown for passes in the invalid partition.
    pub fn invalid_status(&self) -> InvalidStatus {
        if self.deletion_time.is_some() {
            InvalidStatus::Deleted
        } else {
            InvalidStatus::Expired
        }
    }

    /// Instant the pass stopped (or will stop) being usable.
    pub fn status_time(&self) -> NaiveDateTime {
        self.deletion_time.unwrap_or(self.expiry_time)
    }

    pub fn morse(&self) -> Option<&MorseCredential> {
        match &self.credential {
            Credential::Morse(morse) => Some(morse),
            _ => None,
        }
    }

    /// Apply the per-method invariants, correcting rather than rejecting.
    ///
    /// Morse passes are always one-time.
    pub fn enforce_method_rules(&mut self, method: Method) {
        if method == Method::Morse && self.pass_type != PassType::OneTime {
            warn!(
                "Pass {} requested as {} under Morse, forcing one-time",
                self.id, self.pass_type
            );
            self.pass_type = PassType::OneTime;
        }
    }
}

/// User input for a new pass. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct PassDraft {
    pub name: String,
    pub pass_type: PassType,
    pub expiry_time: NaiveDateTime,
    /// Knock sequence, required for Morse passes.
    pub morse_sequence: Option<String>,
}

impl PassDraft {
    /// Draft with the dashboard defaults: one-time, expiring in a week.
    pub fn new(name: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            pass_type: PassType::OneTime,
            expiry_time: now + chrono::Duration::days(7),
            morse_sequence: None,
        }
    }

    /// Build the pass for `method` with the given id.
    ///
    /// Fails for Morse drafts without a complete sequence.
    pub fn into_pass(self, method: Method, id: u64) -> crate::Result<Pass> {
        let credential = match method {
            Method::Morse => {
                let sequence = self
                    .morse_sequence
                    .as_deref()
                    .ok_or(MorseError::Incomplete { units: 0 })?;
                Credential::Morse(MorseCredential::from_sequence(sequence)?)
            }
            Method::Qr => Credential::Qr {
                password: None,
                creation_time: None,
            },
            Method::Voice => Credential::None,
        };

        let mut pass = Pass {
            id,
            name: self.name,
            pass_type: self.pass_type,
            expiry_time: self.expiry_time,
            deletion_time: None,
            credential,
        };
        pass.enforce_method_rules(method);
        Ok(pass)
    }
}
