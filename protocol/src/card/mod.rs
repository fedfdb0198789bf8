//! # Wallet Cards
//!
//! A wallet card is a physical NFC tag carrying one [`WalletCardData`]
//! record. [`CardLifecycleManager`] creates cards and moves them on and off
//! tags.

pub mod manager;
pub mod types;

mod error;

pub use error::CardError;
pub use manager::CardLifecycleManager;
pub use types::{CardMode, WalletCardData};
