//! # Envelopes
//!
//! Versioned, type-tagged JSON carried in QR codes (and optionally on
//! tags):
//!
//! ```text
//! {"type":"SuiSend_<Kind>","version":"1.0","data":{...},"timestamp":<epoch-ms>}
//! ```
//!
//! `<Kind>` is one of `Wallet`, `Transaction`, `PaymentRequest` or
//! `TransactionBundle`.

pub mod codec;
pub mod types;

mod error;
mod validation;

pub use codec::EnvelopeCodec;
pub use error::EnvelopeError;
pub use types::{
    Envelope, EnvelopeKind, ParsedEnvelope, PaymentRequestData, QrTransactionData, QrWalletData,
    TransactionBundleData, TransactionDirection,
};
