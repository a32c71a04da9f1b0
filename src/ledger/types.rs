//! Ledger Core Types
//!
//! Wallet and transaction-record definitions. Balance fields are private:
//! every mutation goes through a checked method so the non-negativity
//! invariant (`balance ≥ 0 ∧ frozen ≥ 0 ∧ unreleased ≥ 0`) cannot be
//! violated by construction — an operation that would underflow is rejected
//! before any field changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::LedgerError;
use super::state::{CreditStatus, TransferStatus};

pub type WalletId = Uuid;
pub type OwnerId = Uuid;

/// Business transaction id — the idempotency key.
///
/// Generated ids are ULIDs (monotonic, sortable, no coordination needed);
/// caller-supplied ids are carried as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(String);

impl TxnId {
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TxnId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TxnId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A wallet row. Amounts are u64 minor units.
///
/// - `balance`: settled, spendable funds
/// - `frozen_balance`: sender-side hold, not yet deducted from `balance`
/// - `unreleased_balance`: receiver-side credit, not yet spendable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owner_id: OwnerId,
    balance: u64,
    frozen_balance: u64,
    unreleased_balance: u64,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            balance: 0,
            frozen_balance: 0,
            unreleased_balance: 0,
            updated_at: Utc::now(),
        }
    }

    /// Reconstruct from stored fields (repository layer only).
    pub fn from_parts(
        id: WalletId,
        owner_id: OwnerId,
        balance: u64,
        frozen_balance: u64,
        unreleased_balance: u64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            balance,
            frozen_balance,
            unreleased_balance,
            updated_at,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn frozen_balance(&self) -> u64 {
        self.frozen_balance
    }

    pub fn unreleased_balance(&self) -> u64 {
        self.unreleased_balance
    }

    /// Spendable portion: settled balance minus outstanding holds.
    ///
    /// frozen_balance never exceeds balance at the moment a hold is raised,
    /// so this cannot underflow.
    pub fn available(&self) -> u64 {
        self.balance.saturating_sub(self.frozen_balance)
    }

    pub fn has_sufficient_balance(&self, amount: u64) -> bool {
        self.available() >= amount
    }

    /// Single-phase deposit: raise settled balance.
    pub fn deposit(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.balance = self.checked_add(self.balance, amount, "balance")?;
        self.touch();
        Ok(())
    }

    /// Freeze step: reserve funds without deducting them.
    pub fn freeze(&mut self, amount: u64) -> Result<(), LedgerError> {
        if !self.has_sufficient_balance(amount) {
            return Err(LedgerError::InsufficientBalance);
        }
        self.frozen_balance = self.checked_add(self.frozen_balance, amount, "frozen_balance")?;
        self.touch();
        Ok(())
    }

    /// Compensation: drop a hold, balance untouched.
    pub fn unfreeze(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.frozen_balance = self.checked_sub(self.frozen_balance, amount, "frozen_balance")?;
        self.touch();
        Ok(())
    }

    /// Settle step, sender side: consume the hold and deduct the balance.
    pub fn settle_out(&mut self, amount: u64) -> Result<(), LedgerError> {
        let frozen = self.checked_sub(self.frozen_balance, amount, "frozen_balance")?;
        let balance = self.checked_sub(self.balance, amount, "balance")?;
        self.frozen_balance = frozen;
        self.balance = balance;
        self.touch();
        Ok(())
    }

    /// Credit step: funds visible but not yet spendable.
    pub fn credit_unreleased(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.unreleased_balance =
            self.checked_add(self.unreleased_balance, amount, "unreleased_balance")?;
        self.touch();
        Ok(())
    }

    /// Settle step, receiver side: move unreleased funds into the balance.
    pub fn release_unreleased(&mut self, amount: u64) -> Result<(), LedgerError> {
        let unreleased = self.checked_sub(self.unreleased_balance, amount, "unreleased_balance")?;
        let balance = self.checked_add(self.balance, amount, "balance")?;
        self.unreleased_balance = unreleased;
        self.balance = balance;
        self.touch();
        Ok(())
    }

    /// Compensation: take back an unsettled credit.
    pub fn revoke_unreleased(&mut self, amount: u64) -> Result<(), LedgerError> {
        self.unreleased_balance =
            self.checked_sub(self.unreleased_balance, amount, "unreleased_balance")?;
        self.touch();
        Ok(())
    }

    fn checked_add(&self, field: u64, amount: u64, name: &str) -> Result<u64, LedgerError> {
        field.checked_add(amount).ok_or_else(|| {
            LedgerError::BalanceInvariant(format!("{} overflow on wallet {}", name, self.id))
        })
    }

    fn checked_sub(&self, field: u64, amount: u64, name: &str) -> Result<u64, LedgerError> {
        field.checked_sub(amount).ok_or_else(|| {
            LedgerError::BalanceInvariant(format!(
                "{} underflow on wallet {} ({} < {})",
                name, self.id, field, amount
            ))
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The per-transfer saga record, keyed by the business transaction id.
///
/// `from_wallet` is None for pure deposits. `to_wallet` may be unknown until
/// the credit step when the freeze ran without a prior intent record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub txn_id: TxnId,
    pub from_wallet: Option<WalletId>,
    pub to_wallet: Option<WalletId>,
    pub amount: u64,
    pub transfer_status: TransferStatus,
    pub credit_status: CreditStatus,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Intent record, created synchronously before the saga runs.
    pub fn new_pending(txn_id: TxnId, from: WalletId, to: WalletId, amount: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            txn_id,
            from_wallet: Some(from),
            to_wallet: Some(to),
            amount,
            transfer_status: TransferStatus::Pending,
            credit_status: CreditStatus::Pending,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Terminal single-phase deposit record.
    pub fn new_topup(txn_id: TxnId, to: WalletId, amount: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            txn_id,
            from_wallet: None,
            to_wallet: Some(to),
            amount,
            transfer_status: TransferStatus::Success,
            credit_status: CreditStatus::Success,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Freeze record created when no intent preceded the freeze.
    pub fn new_frozen(txn_id: TxnId, from: WalletId, amount: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            txn_id,
            from_wallet: Some(from),
            to_wallet: None,
            amount,
            transfer_status: TransferStatus::Frozen,
            credit_status: CreditStatus::Pending,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.transfer_status.is_terminal()
    }

    /// Validated transfer-status transition.
    pub fn set_transfer_status(&mut self, next: TransferStatus) -> Result<(), LedgerError> {
        if !self.transfer_status.can_transition_to(next) {
            return Err(LedgerError::IllegalTransition(format!(
                "{}: {} -> {}",
                self.txn_id, self.transfer_status, next
            )));
        }
        self.transfer_status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Validated credit-status transition.
    pub fn set_credit_status(&mut self, next: CreditStatus) -> Result<(), LedgerError> {
        if !self.credit_status.can_transition_to(next) {
            return Err(LedgerError::IllegalTransition(format!(
                "{}: credit {} -> {}",
                self.txn_id, self.credit_status, next
            )));
        }
        self.credit_status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self, reason: &str) -> Result<(), LedgerError> {
        self.set_transfer_status(TransferStatus::Cancelled)?;
        self.cancel_reason = Some(reason.to_string());
        Ok(())
    }
}
