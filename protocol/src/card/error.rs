//! Errors surfaced by the card lifecycle.

use thiserror::Error;

use crate::ndef::NdefError;
use crate::tag::TagError;

/// Errors returned by [`CardLifecycleManager`](super::CardLifecycleManager).
///
/// Ordinary tag trouble (wrong tag, tag pulled away mid-write) is *not* an
/// error here; it shows up as `Ok(false)` or `Ok(None)`. What remains is
/// API misuse, timeouts, and inputs that can't form a card.
#[derive(Debug, Error)]
pub enum CardError {
    /// Card fields violate the data model (empty address, negative balance).
    #[error("invalid card: {0}")]
    Validation(String),

    /// The wallet collaborator has no active address to put on a card.
    #[error("no wallet is loaded")]
    WalletRequired,

    /// The tag-session controller refused the operation.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// The card could not be turned into an NDEF message.
    #[error(transparent)]
    Encoding(#[from] NdefError),
}
