//! Wallet card data model.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::CardError;

// ---------------------------------------------------------------------------
// CardMode
// ---------------------------------------------------------------------------

/// Which side of a payment a card stands for.
///
/// Serialized in lowercase (`"sender"` / `"receiver"`), both on tags and
/// inside wallet envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardMode {
    /// The card pays out.
    Sender,
    /// The card gets paid.
    Receiver,
}

impl fmt::Display for CardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Receiver => write!(f, "receiver"),
        }
    }
}

// ---------------------------------------------------------------------------
// WalletCardData
// ---------------------------------------------------------------------------

/// The record written to a physical wallet card.
///
/// Field names and order match the on-tag JSON exactly:
/// `id, walletAddress, cardMode, balance, timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletCardData {
    /// Unique card id, `card_<epoch-ms>_<suffix>`.
    pub id: String,
    /// Address of the wallet the card is bound to.
    pub wallet_address: String,
    /// Sender or receiver card.
    pub card_mode: CardMode,
    /// Balance snapshot at creation time. Never negative.
    pub balance: f64,
    /// Creation time in epoch milliseconds.
    pub timestamp: u64,
}

impl WalletCardData {
    /// Check the structural invariants a card must satisfy.
    pub fn validate(&self) -> Result<(), CardError> {
        if self.wallet_address.trim().is_empty() {
            return Err(CardError::Validation(
                "wallet address is empty".to_string(),
            ));
        }
        validate_balance(self.balance)
    }
}

pub(crate) fn validate_balance(balance: f64) -> Result<(), CardError> {
    if !balance.is_finite() || balance < 0.0 {
        return Err(CardError::Validation(format!(
            "balance must be a non-negative number, got {}",
            balance
        )));
    }
    Ok(())
}
