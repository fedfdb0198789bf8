//! # Protocol Configuration & Constants
//!
//! Every magic string and deadline in the card exchange lives here. The
//! envelope prefix and version are part of the wire format: phones already
//! in the field print and scan codes carrying these exact values, so
//! changing them is a breaking change for every wallet out there.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tag::TagTechnology;

// ---------------------------------------------------------------------------
// Envelope Wire Format
// ---------------------------------------------------------------------------

/// Reserved prefix for every envelope `type` discriminator. Anything scanned
/// without it belongs to somebody else's QR code and is ignored.
pub const ENVELOPE_TYPE_PREFIX: &str = "SuiSend_";

/// Envelope schema version stamped on every encoded payload.
pub const ENVELOPE_VERSION: &str = "1.0";

/// Discriminator for a shared wallet envelope.
pub const ENVELOPE_TYPE_WALLET: &str = "SuiSend_Wallet";

/// Discriminator for a single offline transaction envelope.
pub const ENVELOPE_TYPE_TRANSACTION: &str = "SuiSend_Transaction";

/// Discriminator for a payment request envelope.
pub const ENVELOPE_TYPE_PAYMENT_REQUEST: &str = "SuiSend_PaymentRequest";

/// Discriminator for an ordered bundle of offline transactions.
pub const ENVELOPE_TYPE_TRANSACTION_BUNDLE: &str = "SuiSend_TransactionBundle";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Prefix for wallet card ids (`card_<ms>_<suffix>`).
pub const CARD_ID_PREFIX: &str = "card";

/// Prefix for payment request ids (`req_<ms>_<suffix>`).
pub const PAYMENT_REQUEST_ID_PREFIX: &str = "req";

/// Prefix for transaction bundle ids (`bundle_<ms>_<suffix>`).
pub const BUNDLE_ID_PREFIX: &str = "bundle";

/// Prefix for transaction ids minted by the QR exchange (`tx_<ms>_<suffix>`).
pub const TRANSACTION_ID_PREFIX: &str = "tx";

/// Length of the random base-36 suffix appended to generated ids.
pub const ID_SUFFIX_LENGTH: usize = 9;

// ---------------------------------------------------------------------------
// NDEF
// ---------------------------------------------------------------------------

/// Language code written into the status header of every text record.
pub const NDEF_TEXT_LANGUAGE: &str = "en";

// ---------------------------------------------------------------------------
// Timing Constants
// ---------------------------------------------------------------------------

/// Capability probe deadline. Some Android builds never answer the support
/// query at all, so past this point the reader is treated as absent.
pub const PROBE_TIMEOUT_MS: u64 = 5_000;

/// Deadline for bringing the reader subsystem up.
pub const START_TIMEOUT_MS: u64 = 10_000;

/// Deadline for acquiring a tag technology request, i.e. how long a user
/// has to bring a tag into the field once a read or write was requested.
pub const SESSION_TIMEOUT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// Tag Session Configuration
// ---------------------------------------------------------------------------

/// Tunable deadlines for the tag-session controller.
///
/// All fields are optional when deserialized, so a host can override a
/// single deadline from its own settings file and inherit the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSessionConfig {
    /// Capability probe deadline in milliseconds.
    pub probe_timeout_ms: u64,

    /// Reader start-up deadline in milliseconds.
    pub start_timeout_ms: u64,

    /// Tag acquisition deadline in milliseconds.
    pub session_timeout_ms: u64,

    /// Technology requested when a session is opened.
    pub technology: TagTechnology,
}

impl Default for TagSessionConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            start_timeout_ms: START_TIMEOUT_MS,
            session_timeout_ms: SESSION_TIMEOUT_MS,
            technology: TagTechnology::Ndef,
        }
    }
}

impl TagSessionConfig {
    /// Probe deadline as a [`Duration`].
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Start deadline as a [`Duration`].
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    /// Acquisition deadline as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_types_share_the_reserved_prefix() {
        for ty in [
            ENVELOPE_TYPE_WALLET,
            ENVELOPE_TYPE_TRANSACTION,
            ENVELOPE_TYPE_PAYMENT_REQUEST,
            ENVELOPE_TYPE_TRANSACTION_BUNDLE,
        ] {
            assert!(ty.starts_with(ENVELOPE_TYPE_PREFIX), "{ty}");
        }
    }

    #[test]
    fn default_deadlines() {
        let config = TagSessionConfig::default();
        assert_eq!(config.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.start_timeout(), Duration::from_secs(10));
        assert_eq!(config.session_timeout(), Duration::from_secs(30));
        assert_eq!(config.technology, TagTechnology::Ndef);
    }

    #[test]
    fn partial_config_inherits_defaults() {
        let config: TagSessionConfig =
            serde_json::from_str(r#"{"session_timeout_ms": 1500}"#).unwrap();
        assert_eq!(config.session_timeout_ms, 1_500);
        assert_eq!(config.probe_timeout_ms, PROBE_TIMEOUT_MS);
        assert_eq!(config.start_timeout_ms, START_TIMEOUT_MS);
    }
}
