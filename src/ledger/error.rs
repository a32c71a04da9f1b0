//! Ledger Error Types
//!
//! The error taxonomy the orchestrator dispatches on:
//! - validation errors: surfaced synchronously, nothing was mutated
//! - not-found errors: fatal for the current step, compensation runs
//! - lock timeouts: retryable via event redelivery
//! - internal-consistency errors: fatal, logged for investigation, never
//!   auto-compensated

use thiserror::Error;

use super::types::{TxnId, WalletId};
use crate::bus::BusError;
use crate::lock::LockError;

#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    // === Validation ===
    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and destination wallets are the same")]
    SameWallet,

    // === Not found ===
    #[error("Wallet not found: {0}")]
    WalletNotFound(WalletId),

    #[error("Wallet already exists for owner {0}")]
    WalletAlreadyExists(WalletId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TxnId),

    #[error("Duplicate transaction id: {0}")]
    DuplicateTransaction(TxnId),

    // === Concurrency ===
    #[error("Timed out acquiring lock for {0}")]
    LockTimeout(String),

    // === Internal consistency ===
    #[error("Illegal status transition: {0}")]
    IllegalTransition(String),

    #[error("Transfer not ready to confirm: {0}")]
    NotReadyToConfirm(String),

    #[error("Balance invariant violated: {0}")]
    BalanceInvariant(String),

    // === System ===
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Event publish failed: {0}")]
    EventPublish(String),
}

impl LedgerError {
    /// Stable code for API responses and audit fields.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            LedgerError::InvalidAmount => "INVALID_AMOUNT",
            LedgerError::SameWallet => "SAME_WALLET",
            LedgerError::WalletNotFound(_) => "WALLET_NOT_FOUND",
            LedgerError::WalletAlreadyExists(_) => "WALLET_ALREADY_EXISTS",
            LedgerError::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            LedgerError::DuplicateTransaction(_) => "DUPLICATE_TRANSACTION",
            LedgerError::LockTimeout(_) => "LOCK_TIMEOUT",
            LedgerError::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            LedgerError::NotReadyToConfirm(_) => "NOT_READY_TO_CONFIRM",
            LedgerError::BalanceInvariant(_) => "BALANCE_INVARIANT",
            LedgerError::Storage(_) => "STORAGE_ERROR",
            LedgerError::EventPublish(_) => "EVENT_PUBLISH_FAILED",
        }
    }

    /// Retryable errors are not applied; the caller relies on event
    /// redelivery instead of a terminal outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockTimeout(_) | LedgerError::Storage(_) | LedgerError::EventPublish(_)
        )
    }

    /// Protocol violations: never auto-compensated, flagged for manual
    /// investigation.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::IllegalTransition(_)
                | LedgerError::NotReadyToConfirm(_)
                | LedgerError::BalanceInvariant(_)
        )
    }
}

impl From<LockError> for LedgerError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Timeout(key) => LedgerError::LockTimeout(key),
        }
    }
}

impl From<BusError> for LedgerError {
    fn from(e: BusError) -> Self {
        LedgerError::EventPublish(e.to_string())
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
