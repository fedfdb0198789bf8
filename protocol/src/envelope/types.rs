//! Envelope payload types.
//!
//! Field names follow the wire format (camelCase). Optional fields are left
//! out of the JSON entirely when unset.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::card::CardMode;
use crate::config::{
    ENVELOPE_TYPE_PAYMENT_REQUEST, ENVELOPE_TYPE_TRANSACTION, ENVELOPE_TYPE_TRANSACTION_BUNDLE,
    ENVELOPE_TYPE_WALLET,
};

use super::error::EnvelopeError;
use super::validation;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A wallet shared as a QR code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrWalletData {
    pub address: String,
    pub public_key: String,
    /// Never negative.
    pub balance: f64,
    /// Coin object ids, in the wallet's order.
    pub coin_objects: Vec<String>,
    /// Last chain sync, epoch milliseconds.
    pub last_sync: u64,
    pub card_mode: CardMode,
}

/// Direction of a transaction relative to `walletAddress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Send,
    Receive,
}

impl fmt::Display for TransactionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("send"),
            Self::Receive => f.write_str("receive"),
        }
    }
}

/// A single transaction carried offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrTransactionData {
    pub wallet_address: String,
    /// Strictly positive.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Creation time, epoch milliseconds.
    pub timestamp: u64,
    pub transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "type")]
    pub direction: TransactionDirection,
    /// Created while the wallet had no connectivity.
    pub is_offline: bool,
}

/// A request for payment to `recipient`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequestData {
    pub amount: f64,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: u64,
    /// `req_<epoch-ms>_<suffix>`.
    pub id: String,
}

/// An ordered batch of offline transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBundleData {
    pub transactions: Vec<QrTransactionData>,
    /// `bundle_<epoch-ms>_<suffix>`.
    pub bundle_id: String,
    pub timestamp: u64,
    /// Always `transactions.len()`.
    pub total_transactions: usize,
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// The four envelope discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Wallet,
    Transaction,
    PaymentRequest,
    TransactionBundle,
}

impl EnvelopeKind {
    /// Wire value of the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wallet => ENVELOPE_TYPE_WALLET,
            Self::Transaction => ENVELOPE_TYPE_TRANSACTION,
            Self::PaymentRequest => ENVELOPE_TYPE_PAYMENT_REQUEST,
            Self::TransactionBundle => ENVELOPE_TYPE_TRANSACTION_BUNDLE,
        }
    }

    /// Kind named by a wire `type` value, if it is one of ours.
    pub fn from_type(envelope_type: &str) -> Option<Self> {
        match envelope_type {
            ENVELOPE_TYPE_WALLET => Some(Self::Wallet),
            ENVELOPE_TYPE_TRANSACTION => Some(Self::Transaction),
            ENVELOPE_TYPE_PAYMENT_REQUEST => Some(Self::PaymentRequest),
            ENVELOPE_TYPE_TRANSACTION_BUNDLE => Some(Self::TransactionBundle),
            _ => None,
        }
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A schema-checked envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Wallet(QrWalletData),
    Transaction(QrTransactionData),
    PaymentRequest(PaymentRequestData),
    TransactionBundle(TransactionBundleData),
}

impl Envelope {
    /// Wire kind of this envelope.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Wallet(_) => EnvelopeKind::Wallet,
            Self::Transaction(_) => EnvelopeKind::Transaction,
            Self::PaymentRequest(_) => EnvelopeKind::PaymentRequest,
            Self::TransactionBundle(_) => EnvelopeKind::TransactionBundle,
        }
    }
}

/// Result of [`EnvelopeCodec::parse`](super::EnvelopeCodec::parse).
///
/// Only the outer frame has been checked: the text was JSON, `type` carries
/// the reserved prefix, and `data` is present. Nothing about `data` itself
/// is trusted until [`into_envelope`](Self::into_envelope) succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEnvelope {
    /// Raw `type` discriminator.
    pub envelope_type: String,
    /// `version`, if the sender included one.
    pub version: Option<String>,
    /// Untyped payload.
    pub data: Value,
    /// Top-level `timestamp`, if present and numeric.
    pub timestamp: Option<u64>,
}

impl ParsedEnvelope {
    /// Known kind for this envelope's `type`, `None` for a future or
    /// foreign `SuiSend_*` type.
    pub fn kind(&self) -> Option<EnvelopeKind> {
        EnvelopeKind::from_type(&self.envelope_type)
    }

    /// Schema step: decode `data` as the variant its `type` names, then
    /// check the variant's field constraints.
    pub fn into_envelope(self) -> Result<Envelope, EnvelopeError> {
        let kind = self
            .kind()
            .ok_or_else(|| EnvelopeError::UnknownType(self.envelope_type.clone()))?;

        let envelope = match kind {
            EnvelopeKind::Wallet => Envelope::Wallet(decode_data(kind, self.data)?),
            EnvelopeKind::Transaction => Envelope::Transaction(decode_data(kind, self.data)?),
            EnvelopeKind::PaymentRequest => {
                Envelope::PaymentRequest(decode_data(kind, self.data)?)
            }
            EnvelopeKind::TransactionBundle => {
                Envelope::TransactionBundle(decode_data(kind, self.data)?)
            }
        };

        match &envelope {
            Envelope::Wallet(data) => validation::check_wallet(data)?,
            Envelope::Transaction(data) => validation::check_transaction(data)?,
            Envelope::PaymentRequest(data) => validation::check_payment_request(data)?,
            Envelope::TransactionBundle(data) => validation::check_bundle(data)?,
        }
        Ok(envelope)
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(
    kind: EnvelopeKind,
    data: Value,
) -> Result<T, EnvelopeError> {
    serde_json::from_value(data).map_err(|e| EnvelopeError::Decoding {
        envelope_type: kind.as_str().to_string(),
        reason: e.to_string(),
    })
}
