//! # Envelope Codec
//!
//! Encodes the four envelope kinds to compact JSON and recognizes them
//! again on the way back. Recognition is deliberately two-phase:
//!
//! 1. [`EnvelopeCodec::parse`] checks only the frame (JSON object, reserved
//!    `type` prefix, `data` present) and never fails loudly. A scanner that
//!    reads a bus ticket gets `None`, not an error.
//! 2. [`ParsedEnvelope::into_envelope`] or the `validate_*` predicates decide
//!    whether the payload is actually usable.
//!
//! The codec holds no state; one instance can be shared freely.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{
    BUNDLE_ID_PREFIX, ENVELOPE_TYPE_PREFIX, ENVELOPE_VERSION, PAYMENT_REQUEST_ID_PREFIX,
};
use crate::ids::{generate_id, now_millis};

use super::error::EnvelopeError;
use super::types::{
    Envelope, EnvelopeKind, ParsedEnvelope, PaymentRequestData, QrTransactionData, QrWalletData,
    TransactionBundleData,
};
use super::validation;

/// Outer frame as written to the wire. Field order is `type, version,
/// data, timestamp`.
#[derive(Serialize)]
struct WireEnvelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    envelope_type: &'a str,
    version: &'a str,
    data: &'a T,
    timestamp: u64,
}

/// Stateless envelope encoder, parser and validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Codec stamping the current envelope version.
    pub fn new() -> Self {
        Self
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------
    //
    // Every encoder runs the same field checks as `into_envelope`, so a
    // payload the receiving phone would reject (a NaN amount serializes as
    // `null`) fails here with `EnvelopeError::Validation` instead.

    /// Encode a wallet share.
    pub fn encode_wallet(&self, data: &QrWalletData) -> Result<String, EnvelopeError> {
        validation::check_wallet(data)?;
        self.frame(EnvelopeKind::Wallet, data)
    }

    /// Encode a single transaction.
    pub fn encode_transaction(&self, data: &QrTransactionData) -> Result<String, EnvelopeError> {
        validation::check_transaction(data)?;
        self.frame(EnvelopeKind::Transaction, data)
    }

    /// Encode a payment request to `recipient`, minting a fresh `req_` id.
    pub fn encode_payment_request(
        &self,
        amount: f64,
        recipient: &str,
        message: Option<&str>,
    ) -> Result<String, EnvelopeError> {
        let data = PaymentRequestData {
            amount,
            recipient: recipient.to_string(),
            message: message.map(str::to_string),
            timestamp: now_millis(),
            id: generate_id(PAYMENT_REQUEST_ID_PREFIX),
        };
        self.encode_payment_request_data(&data)
    }

    /// Encode `transactions` as a bundle, preserving their order, under a
    /// fresh `bundle_` id.
    pub fn encode_bundle(&self, transactions: &[QrTransactionData]) -> Result<String, EnvelopeError> {
        let data = TransactionBundleData {
            transactions: transactions.to_vec(),
            bundle_id: generate_id(BUNDLE_ID_PREFIX),
            timestamp: now_millis(),
            total_transactions: transactions.len(),
        };
        self.encode_bundle_data(&data)
    }

    /// Encode an already-built envelope.
    pub fn encode(&self, envelope: &Envelope) -> Result<String, EnvelopeError> {
        match envelope {
            Envelope::Wallet(data) => self.encode_wallet(data),
            Envelope::Transaction(data) => self.encode_transaction(data),
            Envelope::PaymentRequest(data) => self.encode_payment_request_data(data),
            Envelope::TransactionBundle(data) => self.encode_bundle_data(data),
        }
    }

    fn encode_payment_request_data(
        &self,
        data: &PaymentRequestData,
    ) -> Result<String, EnvelopeError> {
        validation::check_payment_request(data)?;
        self.frame(EnvelopeKind::PaymentRequest, data)
    }

    fn encode_bundle_data(&self, data: &TransactionBundleData) -> Result<String, EnvelopeError> {
        validation::check_bundle(data)?;
        self.frame(EnvelopeKind::TransactionBundle, data)
    }

    fn frame<T: Serialize>(&self, kind: EnvelopeKind, data: &T) -> Result<String, EnvelopeError> {
        let wire = WireEnvelope {
            envelope_type: kind.as_str(),
            version: ENVELOPE_VERSION,
            data,
            timestamp: now_millis(),
        };
        let text = serde_json::to_string(&wire)?;
        trace!(envelope_type = %kind, bytes = text.len(), "envelope encoded");
        Ok(text)
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Recognize one of our envelopes in arbitrary scanned text.
    ///
    /// Returns `None` when the text isn't a JSON object, has no string
    /// `type`, has a `type` outside the `SuiSend_` namespace, or has no
    /// `data`. The payload itself is not inspected.
    pub fn parse(&self, text: &str) -> Option<ParsedEnvelope> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "scanned text is not JSON");
                return None;
            }
        };

        let Value::Object(mut object) = value else {
            debug!("scanned JSON is not an object");
            return None;
        };

        let envelope_type = match object.get("type") {
            Some(Value::String(t)) if t.starts_with(ENVELOPE_TYPE_PREFIX) => t.clone(),
            _ => {
                debug!("scanned JSON is not a SuiSend envelope");
                return None;
            }
        };

        let data = match object.remove("data") {
            Some(Value::Null) | None => {
                debug!(envelope_type = %envelope_type, "envelope has no data");
                return None;
            }
            Some(data) => data,
        };

        let version = object
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);
        let timestamp = object.get("timestamp").and_then(Value::as_u64);

        debug!(envelope_type = %envelope_type, "envelope recognized");
        Some(ParsedEnvelope {
            envelope_type,
            version,
            data,
            timestamp,
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Whether a transaction is usable: address and id present, amount
    /// strictly positive, timestamp set.
    pub fn validate_transaction(&self, data: &QrTransactionData) -> bool {
        validation::check_transaction(data).is_ok()
    }

    /// Whether a wallet share is usable: address present, balance
    /// non-negative, last sync set.
    pub fn validate_wallet(&self, data: &QrWalletData) -> bool {
        validation::check_wallet(data).is_ok()
    }

    /// Whether a payment request is usable: amount strictly positive,
    /// recipient present, id carries the `req_` prefix.
    pub fn validate_payment_request(&self, data: &PaymentRequestData) -> bool {
        validation::check_payment_request(data).is_ok()
    }

    /// Whether a bundle is usable: `bundle_` id, matching count, every
    /// member a valid transaction.
    pub fn validate_bundle(&self, data: &TransactionBundleData) -> bool {
        validation::check_bundle(data).is_ok()
    }
}
