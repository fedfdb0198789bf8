//! # Wallet Collaborator
//!
//! The protocol never signs, submits or keeps balances itself. It asks the
//! host wallet through [`WalletContext`] and hands it parsed transactions to
//! apply. [`InMemoryWallet`] is a small implementation for tests and demos.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::envelope::{QrTransactionData, TransactionDirection};

/// Whether the host app is set to talk to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Online,
    Offline,
}

/// Failures the wallet reports when applying a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The transaction is well-formed but unacceptable to this wallet.
    #[error("transaction rejected: {0}")]
    Validation(String),

    /// The wallet accepted the transaction but could not process it.
    #[error("transaction processing failed: {0}")]
    Processing(String),
}

/// What the protocol needs from the host wallet.
#[async_trait]
pub trait WalletContext: Send + Sync {
    /// Address of the loaded wallet, `None` if no wallet is loaded.
    fn current_wallet_address(&self) -> Option<String>;

    /// Balance of the loaded wallet.
    fn current_balance(&self) -> f64;

    /// Live connectivity.
    fn is_online(&self) -> bool;

    /// User-selected mode.
    fn app_mode(&self) -> AppMode;

    /// Apply (submit or queue) a transaction received over QR.
    async fn apply_parsed_transaction(&self, data: &QrTransactionData) -> Result<(), WalletError>;

    /// Whether an applied transaction goes out now rather than into the
    /// offline queue.
    fn can_submit(&self) -> bool {
        self.app_mode() == AppMode::Online && self.is_online()
    }
}

// ---------------------------------------------------------------------------
// InMemoryWallet
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct WalletState {
    address: Option<String>,
    balance: f64,
    online: bool,
    mode: AppMode,
    applied: Vec<QrTransactionData>,
    reject_processing: bool,
}

/// A wallet that keeps its balance in memory and records every applied
/// transaction.
///
/// Incoming transactions addressed to it (`recipient` == its address) are
/// credited; transactions it sends are debited and refused when the
/// balance doesn't cover them.
#[derive(Debug)]
pub struct InMemoryWallet {
    state: Mutex<WalletState>,
}

impl InMemoryWallet {
    /// Online wallet with `address` and `balance`.
    pub fn new(address: impl Into<String>, balance: f64) -> Self {
        Self {
            state: Mutex::new(WalletState {
                address: Some(address.into()),
                balance,
                online: true,
                mode: AppMode::Online,
                applied: Vec::new(),
                reject_processing: false,
            }),
        }
    }

    /// Wallet with nothing loaded.
    pub fn empty() -> Self {
        let wallet = Self::new("", 0.0);
        wallet.state.lock().address = None;
        wallet
    }

    /// Flip network connectivity.
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Switch the app mode.
    pub fn set_mode(&self, mode: AppMode) {
        self.state.lock().mode = mode;
    }

    /// Make every apply fail with [`WalletError::Processing`].
    pub fn reject_processing(&self, on: bool) {
        self.state.lock().reject_processing = on;
    }

    /// Transactions applied so far, oldest first.
    pub fn applied(&self) -> Vec<QrTransactionData> {
        self.state.lock().applied.clone()
    }
}

#[async_trait]
impl WalletContext for InMemoryWallet {
    fn current_wallet_address(&self) -> Option<String> {
        self.state.lock().address.clone()
    }

    fn current_balance(&self) -> f64 {
        self.state.lock().balance
    }

    fn is_online(&self) -> bool {
        self.state.lock().online
    }

    fn app_mode(&self) -> AppMode {
        self.state.lock().mode
    }

    async fn apply_parsed_transaction(&self, data: &QrTransactionData) -> Result<(), WalletError> {
        let mut state = self.state.lock();
        if state.reject_processing {
            return Err(WalletError::Processing("wallet is unavailable".into()));
        }
        let Some(address) = state.address.clone() else {
            return Err(WalletError::Validation("no wallet loaded".into()));
        };

        let incoming = data.recipient.as_deref() == Some(address.as_str());
        let outgoing = data.direction == TransactionDirection::Send
            && (data.wallet_address == address || data.sender.as_deref() == Some(address.as_str()));

        if incoming {
            state.balance += data.amount;
        } else if outgoing {
            if data.amount > state.balance {
                return Err(WalletError::Validation(format!(
                    "insufficient balance: {} < {}",
                    state.balance, data.amount
                )));
            }
            state.balance -= data.amount;
        }

        debug!(
            transaction_id = %data.transaction_id,
            amount = data.amount,
            balance = state.balance,
            "transaction applied"
        );
        state.applied.push(data.clone());
        Ok(())
    }
}
