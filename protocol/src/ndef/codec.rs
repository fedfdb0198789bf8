//! Wallet card <-> NDEF bytes.
//!
//! A card is stored as one UTF-8 text record whose body is the compact JSON
//! form of [`WalletCardData`]. Reading is forgiving on purpose: blank tags,
//! transit cards, and tags written by other apps all decode to `None`.

use tracing::debug;

use crate::card::WalletCardData;
use crate::config::NDEF_TEXT_LANGUAGE;

use super::error::NdefError;
use super::record::{NdefMessage, NdefRecord};

/// Converts wallet cards (and plain text) to and from the on-tag format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NdefPayloadCodec;

impl NdefPayloadCodec {
    /// Encode a card as a single-text-record NDEF message.
    ///
    /// # Errors
    ///
    /// [`NdefError::EncodingFailure`] if the card cannot be serialized or
    /// the record cannot be built.
    pub fn encode(card: &WalletCardData) -> Result<Vec<u8>, NdefError> {
        let json = serde_json::to_string(card)
            .map_err(|e| NdefError::EncodingFailure(format!("card serialization: {}", e)))?;
        Self::encode_text(&json)
    }

    /// Encode arbitrary text as a single-text-record NDEF message.
    pub fn encode_text(text: &str) -> Result<Vec<u8>, NdefError> {
        let record = NdefRecord::text(text, NDEF_TEXT_LANGUAGE)?;
        let bytes = NdefMessage::single(record).to_bytes()?;
        if bytes.is_empty() {
            return Err(NdefError::EncodingFailure(
                "record construction produced no bytes".to_string(),
            ));
        }
        Ok(bytes)
    }

    /// Text of the first record, if it is a text record.
    pub fn decode_text(bytes: &[u8]) -> Option<String> {
        let message = match NdefMessage::parse(bytes) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "tag content is not a valid NDEF message");
                return None;
            }
        };

        let record = message.first()?;
        match record.text_content() {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(error = %e, "first NDEF record carries no text");
                None
            }
        }
    }

    /// Decode a wallet card from tag bytes.
    ///
    /// Returns `None` when there is no record, the record isn't text, the
    /// text isn't JSON, or the JSON doesn't describe a valid card.
    pub fn decode(bytes: &[u8]) -> Option<WalletCardData> {
        let text = Self::decode_text(bytes)?;

        let card: WalletCardData = match serde_json::from_str(&text) {
            Ok(card) => card,
            Err(e) => {
                debug!(error = %e, "tag text is not a wallet card");
                return None;
            }
        };

        match card.validate() {
            Ok(()) => Some(card),
            Err(e) => {
                debug!(error = %e, card_id = %card.id, "wallet card on tag failed validation");
                None
            }
        }
    }
}
