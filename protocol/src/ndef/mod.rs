//! # NDEF
//!
//! The tag-side encoding. `record` implements the generic NDEF message
//! framing (short and long records, optional ids, text payloads), and
//! `codec` layers the wallet-card format on top: one text record holding
//! the card's JSON.

pub mod codec;
pub mod record;

mod error;

pub use codec::NdefPayloadCodec;
pub use error::NdefError;
pub use record::{NdefMessage, NdefRecord, Tnf};
