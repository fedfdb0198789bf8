//! # QR Exchange
//!
//! The wallet-facing side of the envelope codec: build QR payloads from the
//! loaded wallet, and turn scanned text back into something the wallet can
//! act on.
//!
//! Scanning is forgiving about *what* was scanned (anything that isn't one
//! of our envelopes is [`ScanOutcome::Unrecognized`]) and strict about
//! *content*: a `SuiSend_*` payload that fails its schema check is an error,
//! because the user pointed the camera at something that claims to be a
//! payment.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::card::CardMode;
use crate::config::TRANSACTION_ID_PREFIX;
use crate::envelope::{
    Envelope, EnvelopeCodec, EnvelopeError, PaymentRequestData, QrTransactionData, QrWalletData,
    TransactionBundleData, TransactionDirection,
};
use crate::ids::{generate_id, now_millis};
use crate::wallet::{AppMode, WalletContext, WalletError};

// ---------------------------------------------------------------------------
// Errors & Outcomes
// ---------------------------------------------------------------------------

/// Failures of QR payload creation and scan processing.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// No wallet is loaded to send from or receive to.
    #[error("no wallet is loaded")]
    WalletRequired,

    /// Inputs for a new payload violate the envelope constraints.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A scanned `SuiSend_*` payload failed its schema check, or a payload
    /// could not be encoded.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The wallet refused or failed to apply a transaction.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// A bundle member failed; it and everything after it were not applied.
    #[error("bundle aborted at transaction {index} ({transaction_id}): {source}")]
    BundleAborted {
        index: usize,
        transaction_id: String,
        source: WalletError,
    },
}

/// Where an applied transaction went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Handed to the network immediately.
    Submitted,
    /// Held until the wallet is back online.
    Queued,
}

/// What a scan turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// Not one of our envelopes. Nothing happened.
    Unrecognized,
    /// A transaction, applied to the wallet.
    Transaction {
        data: QrTransactionData,
        settlement: Settlement,
    },
    /// A bundle, every member applied in order.
    Bundle {
        data: TransactionBundleData,
        settlement: Settlement,
    },
    /// A payment request for the caller to confirm.
    PaymentRequest(PaymentRequestData),
    /// Someone else's wallet.
    Wallet(QrWalletData),
}

// ---------------------------------------------------------------------------
// QrExchange
// ---------------------------------------------------------------------------

/// QR payload builder and scan processor for one wallet.
pub struct QrExchange<W: WalletContext + ?Sized> {
    codec: EnvelopeCodec,
    wallet: Arc<W>,
}

impl<W: WalletContext + ?Sized> QrExchange<W> {
    /// Exchange bound to `wallet`.
    pub fn new(wallet: Arc<W>) -> Self {
        Self {
            codec: EnvelopeCodec::new(),
            wallet,
        }
    }

    /// Envelope codec used for every payload.
    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    /// The bound wallet.
    pub fn wallet(&self) -> &Arc<W> {
        &self.wallet
    }

    fn address(&self) -> Result<String, ExchangeError> {
        self.wallet
            .current_wallet_address()
            .filter(|a| !a.trim().is_empty())
            .ok_or(ExchangeError::WalletRequired)
    }

    fn settlement(&self) -> Settlement {
        if self.wallet.can_submit() {
            Settlement::Submitted
        } else {
            Settlement::Queued
        }
    }

    // -----------------------------------------------------------------------
    // Composing
    // -----------------------------------------------------------------------

    /// QR text for sending `amount` from the loaded wallet to `recipient`.
    pub fn transaction_qr(&self, amount: f64, recipient: &str) -> Result<String, ExchangeError> {
        let address = self.address()?;
        if recipient.trim().is_empty() {
            return Err(ExchangeError::Validation("recipient is empty".into()));
        }

        let data = QrTransactionData {
            wallet_address: address.clone(),
            amount,
            recipient: Some(recipient.to_string()),
            sender: Some(address),
            timestamp: now_millis(),
            transaction_id: generate_id(TRANSACTION_ID_PREFIX),
            signature: None,
            direction: TransactionDirection::Send,
            is_offline: self.wallet.app_mode() == AppMode::Offline || !self.wallet.is_online(),
        };
        if !self.codec.validate_transaction(&data) {
            return Err(ExchangeError::Validation(format!(
                "cannot send {} to {}",
                amount, recipient
            )));
        }

        let text = self.codec.encode_transaction(&data)?;
        info!(
            transaction_id = %data.transaction_id,
            amount,
            offline = data.is_offline,
            "transaction QR generated"
        );
        Ok(text)
    }

    /// QR text asking for `amount` to be paid to the loaded wallet.
    pub fn payment_request_qr(
        &self,
        amount: f64,
        message: Option<&str>,
    ) -> Result<String, ExchangeError> {
        let address = self.address()?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ExchangeError::Validation(format!(
                "requested amount must be positive, got {}",
                amount
            )));
        }
        let text = self.codec.encode_payment_request(amount, &address, message)?;
        info!(amount, "payment request QR generated");
        Ok(text)
    }

    /// QR text sharing the loaded wallet.
    pub fn wallet_qr(
        &self,
        public_key: &str,
        coin_objects: Vec<String>,
        card_mode: CardMode,
    ) -> Result<String, ExchangeError> {
        let data = QrWalletData {
            address: self.address()?,
            public_key: public_key.to_string(),
            balance: self.wallet.current_balance(),
            coin_objects,
            last_sync: now_millis(),
            card_mode,
        };
        if !self.codec.validate_wallet(&data) {
            return Err(ExchangeError::Validation("wallet cannot be shared".into()));
        }
        Ok(self.codec.encode_wallet(&data)?)
    }

    // -----------------------------------------------------------------------
    // Scanning
    // -----------------------------------------------------------------------

    /// Act on scanned text.
    ///
    /// Transactions and bundles are applied to the wallet; requests and
    /// wallet shares are returned for the caller to present.
    pub async fn process_scan(&self, text: &str) -> Result<ScanOutcome, ExchangeError> {
        let Some(parsed) = self.codec.parse(text) else {
            return Ok(ScanOutcome::Unrecognized);
        };

        let envelope = match parsed.into_envelope() {
            Ok(envelope) => envelope,
            Err(EnvelopeError::UnknownType(envelope_type)) => {
                debug!(envelope_type = %envelope_type, "ignoring unsupported envelope type");
                return Ok(ScanOutcome::Unrecognized);
            }
            Err(e) => {
                warn!(error = %e, "scanned envelope failed its schema check");
                return Err(e.into());
            }
        };

        match envelope {
            Envelope::Transaction(data) => {
                let settlement = self.settlement();
                self.wallet.apply_parsed_transaction(&data).await?;
                info!(
                    transaction_id = %data.transaction_id,
                    amount = data.amount,
                    ?settlement,
                    "scanned transaction applied"
                );
                Ok(ScanOutcome::Transaction { data, settlement })
            }
            Envelope::TransactionBundle(data) => {
                let settlement = self.settlement();
                for (index, tx) in data.transactions.iter().enumerate() {
                    if let Err(source) = self.wallet.apply_parsed_transaction(tx).await {
                        warn!(
                            bundle_id = %data.bundle_id,
                            index,
                            error = %source,
                            "bundle aborted"
                        );
                        return Err(ExchangeError::BundleAborted {
                            index,
                            transaction_id: tx.transaction_id.clone(),
                            source,
                        });
                    }
                }
                info!(
                    bundle_id = %data.bundle_id,
                    total = data.total_transactions,
                    ?settlement,
                    "scanned bundle applied"
                );
                Ok(ScanOutcome::Bundle { data, settlement })
            }
            Envelope::PaymentRequest(data) => {
                debug!(request_id = %data.id, amount = data.amount, "payment request scanned");
                Ok(ScanOutcome::PaymentRequest(data))
            }
            Envelope::Wallet(data) => {
                debug!(address = %data.address, "wallet share scanned");
                Ok(ScanOutcome::Wallet(data))
            }
        }
    }
}
