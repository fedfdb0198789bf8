//! # Card Lifecycle
//!
//! The three things the app does with a physical wallet card: mint one,
//! write it, read it back.
//!
//! ## Error policy
//!
//! Tag trouble a user can fix by trying again (wrong tag, tag pulled away,
//! read-only tag) is reported as `Ok(false)` / `Ok(None)`. Calling before
//! the reader is started, a busy reader, a timeout, or a card that can't be
//! encoded are real errors. Either way the tag session is closed before the
//! call returns; [`TagSessionController`] guarantees that.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CARD_ID_PREFIX;
use crate::ids::{generate_id, now_millis};
use crate::ndef::NdefPayloadCodec;
use crate::tag::{TagError, TagSessionController};
use crate::wallet::WalletContext;

use super::error::CardError;
use super::types::{validate_balance, CardMode, WalletCardData};

/// Creates, writes and reads wallet cards through a shared controller.
#[derive(Debug, Clone)]
pub struct CardLifecycleManager {
    controller: Arc<TagSessionController>,
}

impl CardLifecycleManager {
    /// Manager driving tags through `controller`.
    pub fn new(controller: Arc<TagSessionController>) -> Self {
        Self { controller }
    }

    /// The controller this manager writes through.
    pub fn controller(&self) -> &Arc<TagSessionController> {
        &self.controller
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Mint a new card. No hardware is touched.
    ///
    /// # Errors
    ///
    /// [`CardError::Validation`] for an empty address or a negative or
    /// non-finite balance.
    pub fn create_card(
        &self,
        wallet_address: &str,
        card_mode: CardMode,
        balance: f64,
    ) -> Result<WalletCardData, CardError> {
        if wallet_address.trim().is_empty() {
            return Err(CardError::Validation("wallet address is empty".to_string()));
        }
        validate_balance(balance)?;

        let card = WalletCardData {
            id: generate_id(CARD_ID_PREFIX),
            wallet_address: wallet_address.to_string(),
            card_mode,
            balance,
            timestamp: now_millis(),
        };
        info!(card_id = %card.id, card_mode = %card_mode, "wallet card created");
        Ok(card)
    }

    /// Mint a card for the wallet currently loaded in the host app.
    ///
    /// # Errors
    ///
    /// [`CardError::WalletRequired`] when no wallet is loaded, otherwise as
    /// [`create_card`](Self::create_card).
    pub fn create_card_from_wallet<W>(
        &self,
        wallet: &W,
        card_mode: CardMode,
    ) -> Result<WalletCardData, CardError>
    where
        W: WalletContext + ?Sized,
    {
        let address = wallet
            .current_wallet_address()
            .filter(|a| !a.trim().is_empty())
            .ok_or(CardError::WalletRequired)?;
        self.create_card(&address, card_mode, wallet.current_balance())
    }

    // -----------------------------------------------------------------------
    // Tag I/O
    // -----------------------------------------------------------------------

    /// Write `card` to the next tag presented.
    ///
    /// Returns `Ok(false)` if the tag couldn't take the write.
    pub async fn write_card_to_tag(&self, card: &WalletCardData) -> Result<bool, CardError> {
        self.ensure_initialized()?;
        let bytes = NdefPayloadCodec::encode(card)?;

        let written = absorb(self.controller.write_ndef(&bytes).await, "write card")?.is_some();
        if written {
            info!(card_id = %card.id, bytes = bytes.len(), "wallet card written to tag");
        }
        Ok(written)
    }

    /// Write a plain text record to the next tag presented.
    pub async fn write_text_to_tag(&self, text: &str) -> Result<bool, CardError> {
        self.ensure_initialized()?;
        let bytes = NdefPayloadCodec::encode_text(text)?;

        let written = absorb(self.controller.write_ndef(&bytes).await, "write text")?.is_some();
        if written {
            debug!(bytes = bytes.len(), "text written to tag");
        }
        Ok(written)
    }

    /// Read a card from the next tag presented.
    ///
    /// `Ok(None)` covers no tag, a blank tag, another app's tag and a
    /// corrupted card alike.
    pub async fn read_card_from_tag(&self) -> Result<Option<WalletCardData>, CardError> {
        self.ensure_initialized()?;

        let Some(read) = absorb(self.controller.read_tag().await, "read card")?.flatten() else {
            return Ok(None);
        };
        let Some(message) = read.message else {
            debug!(tag_id = %read.handle.id_hex(), "tag holds no NDEF message");
            return Ok(None);
        };

        let card = NdefPayloadCodec::decode(&message);
        match &card {
            Some(card) => info!(
                card_id = %card.id,
                tag_id = %read.handle.id_hex(),
                "wallet card read from tag"
            ),
            None => debug!(tag_id = %read.handle.id_hex(), "tag holds no wallet card"),
        }
        Ok(card)
    }

    fn ensure_initialized(&self) -> Result<(), CardError> {
        if self.controller.is_initialized() {
            Ok(())
        } else {
            Err(TagError::NotInitialized.into())
        }
    }
}

/// Fold transient hardware failures into `Ok(None)`; pass everything else
/// through.
fn absorb<T>(result: Result<T, TagError>, operation: &str) -> Result<Option<T>, CardError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(TagError::Hardware(e)) => {
            warn!(error = %e, operation, "tag operation failed");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
