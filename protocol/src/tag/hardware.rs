//! # Hardware Seam
//!
//! [`NfcHardware`] is the only thing the controller knows about the radio.
//! Platform bindings (Android `NfcAdapter`, iOS Core NFC, a PC/SC reader)
//! implement it; tests use [`SimulatedReader`](super::SimulatedReader).
//!
//! Calls that can block on the outside world (the capability query,
//! bringing the reader up, waiting for a tag) take a
//! [`CancellationToken`]. The controller cancels it when its deadline
//! fires, so a backend can abandon the platform call instead of leaking it.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::error::HardwareError;

// ---------------------------------------------------------------------------
// TagTechnology
// ---------------------------------------------------------------------------

/// Tag technologies a reader can request or a tag can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagTechnology {
    /// NFC Forum NDEF formatted content.
    Ndef,
    /// ISO 14443-3A.
    NfcA,
    /// ISO 14443-3B.
    NfcB,
    /// JIS 6319-4 (FeliCa).
    NfcF,
    /// ISO 15693.
    NfcV,
    /// ISO 14443-4.
    IsoDep,
    /// MIFARE Classic.
    MifareClassic,
    /// MIFARE Ultralight / NTAG.
    MifareUltralight,
    /// Blank tag that can be formatted for NDEF.
    NdefFormatable,
}

impl fmt::Display for TagTechnology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ndef => "Ndef",
            Self::NfcA => "NfcA",
            Self::NfcB => "NfcB",
            Self::NfcF => "NfcF",
            Self::NfcV => "NfcV",
            Self::IsoDep => "IsoDep",
            Self::MifareClassic => "MifareClassic",
            Self::MifareUltralight => "MifareUltralight",
            Self::NdefFormatable => "NdefFormatable",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// TagHandle
// ---------------------------------------------------------------------------

/// A tag detected by the reader. Lives for one session and is never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHandle {
    /// Tag UID as reported by the reader.
    pub id: Vec<u8>,
    /// Technologies the tag declared, in reader order.
    pub tech_types: Vec<TagTechnology>,
}

impl TagHandle {
    /// Create a handle from a UID and declared technologies.
    pub fn new(id: impl Into<Vec<u8>>, tech_types: Vec<TagTechnology>) -> Self {
        Self {
            id: id.into(),
            tech_types,
        }
    }

    /// Lowercase hex rendering of the UID, `"unknown"` if the reader gave none.
    pub fn id_hex(&self) -> String {
        if self.id.is_empty() {
            "unknown".to_string()
        } else {
            hex::encode(&self.id)
        }
    }

    /// The first declared technology.
    pub fn primary_technology(&self) -> Option<TagTechnology> {
        self.tech_types.first().copied()
    }

    /// Whether the tag declared `technology`.
    pub fn supports(&self, technology: TagTechnology) -> bool {
        self.tech_types.contains(&technology)
    }
}

/// Callback invoked by the backend whenever a tag enters the field.
pub type TagListener = Arc<dyn Fn(TagHandle) + Send + Sync>;

// ---------------------------------------------------------------------------
// NfcHardware
// ---------------------------------------------------------------------------

/// Platform NFC reader.
///
/// Implementations must be callable from any task; the controller
/// serializes sessions itself, so backends need no locking beyond what
/// their own state requires.
#[async_trait]
pub trait NfcHardware: Send + Sync {
    /// Does this device have a usable reader?
    async fn is_supported(&self, cancel: &CancellationToken) -> Result<bool, HardwareError>;

    /// Bring the reader subsystem up.
    async fn start(&self, cancel: &CancellationToken) -> Result<(), HardwareError>;

    /// Tear the reader subsystem down.
    async fn stop(&self) -> Result<(), HardwareError>;

    /// Wait for a tag supporting `technology` and claim it.
    async fn request_technology(
        &self,
        technology: TagTechnology,
        cancel: &CancellationToken,
    ) -> Result<(), HardwareError>;

    /// Release the outstanding technology request, if any.
    async fn cancel_technology_request(&self) -> Result<(), HardwareError>;

    /// The tag claimed by the current request.
    async fn get_tag(&self) -> Result<Option<TagHandle>, HardwareError>;

    /// Raw NDEF message bytes of the claimed tag; `None` if it holds none.
    async fn read_ndef_message(&self) -> Result<Option<Vec<u8>>, HardwareError>;

    /// Overwrite the claimed tag's NDEF message.
    async fn write_ndef_message(&self, message: &[u8]) -> Result<(), HardwareError>;

    /// Install (`Some`) or remove (`None`) the platform tag-discovery callback.
    async fn set_tag_listener(&self, listener: Option<TagListener>) -> Result<(), HardwareError>;
}
