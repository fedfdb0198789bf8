//! Field constraints for envelope payloads.
//!
//! Shape (required fields, enum membership) is enforced by deserialization.
//! These checks cover what a type can't say: non-empty strings, amount
//! strictly positive, balance non-negative, id prefixes, bundle counts.

use crate::config::{BUNDLE_ID_PREFIX, PAYMENT_REQUEST_ID_PREFIX};

use super::error::EnvelopeError;
use super::types::{PaymentRequestData, QrTransactionData, QrWalletData, TransactionBundleData};

fn invalid(reason: impl Into<String>) -> EnvelopeError {
    EnvelopeError::Validation(reason.into())
}

fn require_text(value: &str, field: &str) -> Result<(), EnvelopeError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} is empty", field)));
    }
    Ok(())
}

fn require_positive(value: f64, field: &str) -> Result<(), EnvelopeError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(format!("{} must be positive, got {}", field, value)));
    }
    Ok(())
}

fn require_prefixed(value: &str, prefix: &str, field: &str) -> Result<(), EnvelopeError> {
    let prefixed = value
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|rest| !rest.is_empty());
    if !prefixed {
        return Err(invalid(format!("{} must start with {}_", field, prefix)));
    }
    Ok(())
}

pub(crate) fn check_transaction(data: &QrTransactionData) -> Result<(), EnvelopeError> {
    require_text(&data.wallet_address, "walletAddress")?;
    require_positive(data.amount, "amount")?;
    if data.timestamp == 0 {
        return Err(invalid("timestamp is missing"));
    }
    require_text(&data.transaction_id, "transactionId")
}

pub(crate) fn check_wallet(data: &QrWalletData) -> Result<(), EnvelopeError> {
    require_text(&data.address, "address")?;
    if !data.balance.is_finite() || data.balance < 0.0 {
        return Err(invalid(format!(
            "balance must be non-negative, got {}",
            data.balance
        )));
    }
    if data.last_sync == 0 {
        return Err(invalid("lastSync is missing"));
    }
    Ok(())
}

pub(crate) fn check_payment_request(data: &PaymentRequestData) -> Result<(), EnvelopeError> {
    require_positive(data.amount, "amount")?;
    require_text(&data.recipient, "recipient")?;
    require_prefixed(&data.id, PAYMENT_REQUEST_ID_PREFIX, "id")
}

pub(crate) fn check_bundle(data: &TransactionBundleData) -> Result<(), EnvelopeError> {
    require_prefixed(&data.bundle_id, BUNDLE_ID_PREFIX, "bundleId")?;
    if data.total_transactions != data.transactions.len() {
        return Err(invalid(format!(
            "totalTransactions is {} but bundle holds {}",
            data.total_transactions,
            data.transactions.len()
        )));
    }
    for (index, tx) in data.transactions.iter().enumerate() {
        check_transaction(tx)
            .map_err(|e| invalid(format!("transaction {}: {}", index, e)))?;
    }
    Ok(())
}
