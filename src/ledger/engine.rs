//! Wallet Balance Engine
//!
//! The five balance-moving operations. Every operation acquires the relevant
//! lock internally and executes its balance + record mutation as one unit
//! under that lock; lock hold time is bounded to that critical section.
//!
//! Lock discipline: `top_up`/`transfer_out`/`transfer_in` take exactly one
//! wallet-level lock. `confirm_transfer`/`cancel_transfer` take the
//! transaction-level lock first (serializing confirm against cancel for the
//! same transaction id), then touch each wallet under its own lock, one at a
//! time — two wallet locks are never held together, so there is no
//! cross-wallet ordering to deadlock on.
//!
//! Every operation is an idempotent no-op when the record shows its step was
//! already applied, which is what makes at-least-once event redelivery safe.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::LedgerError;
use super::state::{CreditStatus, TransferStatus};
use super::store::{TransactionStore, WalletStore};
use super::types::{OwnerId, TransactionRecord, TxnId, Wallet, WalletId};
use crate::audit::AuditSink;
use crate::lock::LockManager;

fn wallet_key(id: WalletId) -> String {
    format!("wallet:{}", id)
}

fn txn_key(id: &TxnId) -> String {
    format!("transaction:{}", id)
}

pub struct Ledger {
    wallets: Arc<dyn WalletStore>,
    txns: Arc<dyn TransactionStore>,
    locks: Arc<dyn LockManager>,
    audit: Arc<dyn AuditSink>,
    lease: Duration,
}

impl Ledger {
    pub fn new(
        wallets: Arc<dyn WalletStore>,
        txns: Arc<dyn TransactionStore>,
        locks: Arc<dyn LockManager>,
        audit: Arc<dyn AuditSink>,
        lease: Duration,
    ) -> Self {
        Self {
            wallets,
            txns,
            locks,
            audit,
            lease,
        }
    }

    /// Provision a wallet for an owner. One wallet per owner.
    pub async fn create_wallet(&self, owner_id: OwnerId) -> Result<Wallet, LedgerError> {
        if self.wallets.find_by_owner(owner_id).await?.is_some() {
            return Err(LedgerError::WalletAlreadyExists(owner_id));
        }
        let wallet = Wallet::new(owner_id);
        self.wallets.create(&wallet).await?;
        info!(wallet_id = %wallet.id, owner_id = %owner_id, "Wallet created");
        Ok(wallet)
    }

    pub async fn wallet(&self, id: WalletId) -> Result<Wallet, LedgerError> {
        self.wallets
            .get(id)
            .await?
            .ok_or(LedgerError::WalletNotFound(id))
    }

    pub async fn transaction(&self, txn_id: &TxnId) -> Result<TransactionRecord, LedgerError> {
        self.txns
            .get(txn_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(txn_id.clone()))
    }

    pub async fn history(&self, wallet_id: WalletId) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.txns.history_for_wallet(wallet_id).await
    }

    /// Record a pending transfer intent. Called synchronously before the
    /// intent event is published.
    pub async fn record_intent(
        &self,
        from: WalletId,
        to: WalletId,
        amount: u64,
        txn_id: &TxnId,
    ) -> Result<(), LedgerError> {
        let record = TransactionRecord::new_pending(txn_id.clone(), from, to, amount);
        self.txns.insert(&record).await
    }

    /// Single-phase deposit.
    pub async fn top_up(
        &self,
        wallet_id: WalletId,
        amount: u64,
        txn_id: &TxnId,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let _guard = self.locks.acquire(&wallet_key(wallet_id), self.lease).await?;

        if self.txns.get(txn_id).await?.is_some() {
            debug!(%txn_id, "Top-up already applied, redelivery ignored");
            return Ok(());
        }

        let mut wallet = self.wallet(wallet_id).await?;
        wallet.deposit(amount)?;
        self.wallets.save(&wallet).await?;

        let record = TransactionRecord::new_topup(txn_id.clone(), wallet_id, amount);
        self.txns.insert(&record).await?;

        self.audit
            .record(
                "TOP_UP",
                txn_id,
                json!({"wallet_id": wallet_id, "amount": amount}),
            )
            .await;
        info!(%txn_id, wallet_id = %wallet_id, amount, "Top-up applied");
        Ok(())
    }

    /// Freeze step: reserve funds on the sender without deducting them.
    pub async fn transfer_out(
        &self,
        wallet_id: WalletId,
        amount: u64,
        txn_id: &TxnId,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let _guard = self.locks.acquire(&wallet_key(wallet_id), self.lease).await?;

        // A record past PENDING means the freeze (or more) was already applied.
        let existing = self.txns.get(txn_id).await?;
        if let Some(ref record) = existing
            && record.transfer_status != TransferStatus::Pending
        {
            debug!(%txn_id, status = %record.transfer_status, "Freeze already applied, redelivery ignored");
            return Ok(());
        }

        let mut wallet = self.wallet(wallet_id).await?;
        wallet.freeze(amount)?;
        self.wallets.save(&wallet).await?;

        match existing {
            Some(mut record) => {
                record.from_wallet.get_or_insert(wallet_id);
                record.set_transfer_status(TransferStatus::Frozen)?;
                self.txns.save(&record).await?;
            }
            None => {
                // No prior intent (direct ledger use); receiver is recorded
                // at the credit step.
                let record = TransactionRecord::new_frozen(txn_id.clone(), wallet_id, amount);
                self.txns.insert(&record).await?;
            }
        }

        self.audit
            .record(
                "BALANCE_FROZEN",
                txn_id,
                json!({"wallet_id": wallet_id, "amount": amount}),
            )
            .await;
        info!(%txn_id, wallet_id = %wallet_id, amount, "Sender funds frozen");
        Ok(())
    }

    /// Credit step: raise the receiver's unreleased balance.
    pub async fn transfer_in(
        &self,
        wallet_id: WalletId,
        amount: u64,
        txn_id: &TxnId,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let _guard = self.locks.acquire(&wallet_key(wallet_id), self.lease).await?;

        let mut record = self.transaction(txn_id).await?;
        if record.credit_status == CreditStatus::Success {
            debug!(%txn_id, "Credit already applied, redelivery ignored");
            return Ok(());
        }
        if record.is_terminal() {
            debug!(%txn_id, status = %record.transfer_status, "Record terminal, credit ignored");
            return Ok(());
        }

        let mut wallet = self.wallet(wallet_id).await?;
        wallet.credit_unreleased(amount)?;
        self.wallets.save(&wallet).await?;

        record.to_wallet = Some(wallet_id);
        record.set_credit_status(CreditStatus::Success)?;
        self.txns.save(&record).await?;

        self.audit
            .record(
                "BALANCE_CREDITED",
                txn_id,
                json!({"wallet_id": wallet_id, "amount": amount}),
            )
            .await;
        info!(%txn_id, wallet_id = %wallet_id, amount, "Receiver credited (unreleased)");
        Ok(())
    }

    /// Settle step: requires `FROZEN ∧ credit SUCCESS`. Consumes the sender
    /// hold and releases the receiver credit into spendable balance.
    pub async fn confirm_transfer(&self, txn_id: &TxnId) -> Result<(), LedgerError> {
        let _txn_guard = self.locks.acquire(&txn_key(txn_id), self.lease).await?;

        let mut record = self.transaction(txn_id).await?;
        if record.is_terminal() {
            // Either this confirm was redelivered (SUCCESS) or a serialized
            // cancel won the race; both are no-ops.
            debug!(%txn_id, status = %record.transfer_status, "Record terminal, confirm ignored");
            return Ok(());
        }
        if record.transfer_status != TransferStatus::Frozen
            || record.credit_status != CreditStatus::Success
        {
            return Err(LedgerError::NotReadyToConfirm(format!(
                "{}: status={} credit={}",
                txn_id, record.transfer_status, record.credit_status
            )));
        }

        let from = record.from_wallet.ok_or_else(|| {
            LedgerError::BalanceInvariant(format!("{} frozen without sender wallet", txn_id))
        })?;
        let to = record.to_wallet.ok_or_else(|| {
            LedgerError::BalanceInvariant(format!("{} credited without receiver wallet", txn_id))
        })?;
        let amount = record.amount;

        {
            let _guard = self.locks.acquire(&wallet_key(from), self.lease).await?;
            let mut sender = self.wallet(from).await?;
            sender.settle_out(amount)?;
            self.wallets.save(&sender).await?;
        }
        {
            let _guard = self.locks.acquire(&wallet_key(to), self.lease).await?;
            let mut receiver = self.wallet(to).await?;
            receiver.release_unreleased(amount)?;
            self.wallets.save(&receiver).await?;
        }

        record.set_transfer_status(TransferStatus::Success)?;
        self.txns.save(&record).await?;

        self.audit
            .record(
                "TRANSFER_CONFIRMED",
                txn_id,
                json!({"from": from, "to": to, "amount": amount}),
            )
            .await;
        info!(%txn_id, from = %from, to = %to, amount, "Transfer settled");
        Ok(())
    }

    /// Compensate step: reverse whatever was applied, then mark CANCELLED.
    ///
    /// Safe to call with no record (no-op) and on terminal records (no-op).
    pub async fn cancel_transfer(&self, txn_id: &TxnId, reason: &str) -> Result<(), LedgerError> {
        let _txn_guard = self.locks.acquire(&txn_key(txn_id), self.lease).await?;

        let Some(mut record) = self.txns.get(txn_id).await? else {
            // Failure happened before the record was persisted.
            debug!(%txn_id, "No record, nothing to roll back");
            return Ok(());
        };
        if record.is_terminal() {
            debug!(%txn_id, status = %record.transfer_status, "Record terminal, cancel ignored");
            return Ok(());
        }

        let amount = record.amount;

        if record.transfer_status == TransferStatus::Frozen
            && let Some(from) = record.from_wallet
        {
            let _guard = self.locks.acquire(&wallet_key(from), self.lease).await?;
            let mut sender = self.wallet(from).await?;
            sender.unfreeze(amount)?;
            self.wallets.save(&sender).await?;
        }

        if record.credit_status == CreditStatus::Success
            && let Some(to) = record.to_wallet
        {
            let _guard = self.locks.acquire(&wallet_key(to), self.lease).await?;
            let mut receiver = self.wallet(to).await?;
            receiver.revoke_unreleased(amount)?;
            self.wallets.save(&receiver).await?;
        }

        record.cancel(reason)?;
        self.txns.save(&record).await?;

        self.audit
            .record(
                "TRANSFER_CANCELLED",
                txn_id,
                json!({"amount": amount, "reason": reason}),
            )
            .await;
        warn!(%txn_id, amount, reason, "Transfer cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::LogAuditSink;
    use crate::ledger::store::{MemoryTransactionStore, MemoryWalletStore};
    use crate::lock::LeaseLockManager;

    fn ledger() -> Ledger {
        Ledger::new(
            Arc::new(MemoryWalletStore::new()),
            Arc::new(MemoryTransactionStore::new()),
            Arc::new(LeaseLockManager::new(Duration::from_millis(5))),
            Arc::new(LogAuditSink),
            Duration::from_secs(2),
        )
    }

    async fn funded_wallet(ledger: &Ledger, amount: u64) -> WalletId {
        let wallet = ledger.create_wallet(uuid::Uuid::new_v4()).await.unwrap();
        if amount > 0 {
            ledger
                .top_up(wallet.id, amount, &TxnId::generate())
                .await
                .unwrap();
        }
        wallet.id
    }

    #[tokio::test]
    async fn test_top_up_is_idempotent() {
        let ledger = ledger();
        let wallet = funded_wallet(&ledger, 0).await;
        let txn = TxnId::from("t1");

        ledger.top_up(wallet, 100, &txn).await.unwrap();
        ledger.top_up(wallet, 100, &txn).await.unwrap();

        assert_eq!(ledger.wallet(wallet).await.unwrap().balance(), 100);
    }

    #[tokio::test]
    async fn test_transfer_out_insufficient_balance() {
        let ledger = ledger();
        let wallet = funded_wallet(&ledger, 50).await;

        let result = ledger.transfer_out(wallet, 60, &TxnId::from("t1")).await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance)));

        let state = ledger.wallet(wallet).await.unwrap();
        assert_eq!(state.balance(), 50);
        assert_eq!(state.frozen_balance(), 0);
    }

    #[tokio::test]
    async fn test_frozen_funds_are_not_spendable() {
        let ledger = ledger();
        let wallet = funded_wallet(&ledger, 100).await;

        ledger
            .transfer_out(wallet, 60, &TxnId::from("t1"))
            .await
            .unwrap();

        // 40 available left; a second 60 hold must be rejected.
        let result = ledger.transfer_out(wallet, 60, &TxnId::from("t2")).await;
        assert!(matches!(result, Err(LedgerError::InsufficientBalance)));
    }

    #[tokio::test]
    async fn test_full_saga_conserves_funds() {
        let ledger = ledger();
        let sender = funded_wallet(&ledger, 100).await;
        let receiver = funded_wallet(&ledger, 0).await;
        let txn = TxnId::from("t2");

        ledger.transfer_out(sender, 50, &txn).await.unwrap();
        let s = ledger.wallet(sender).await.unwrap();
        assert_eq!((s.balance(), s.frozen_balance()), (100, 50));

        ledger.transfer_in(receiver, 50, &txn).await.unwrap();
        let r = ledger.wallet(receiver).await.unwrap();
        assert_eq!((r.balance(), r.unreleased_balance()), (0, 50));

        ledger.confirm_transfer(&txn).await.unwrap();

        let s = ledger.wallet(sender).await.unwrap();
        let r = ledger.wallet(receiver).await.unwrap();
        assert_eq!((s.balance(), s.frozen_balance()), (50, 0));
        assert_eq!((r.balance(), r.unreleased_balance()), (50, 0));

        let record = ledger.transaction(&txn).await.unwrap();
        assert_eq!(record.transfer_status, TransferStatus::Success);
    }

    #[tokio::test]
    async fn test_saga_steps_are_redelivery_safe() {
        let ledger = ledger();
        let sender = funded_wallet(&ledger, 100).await;
        let receiver = funded_wallet(&ledger, 0).await;
        let txn = TxnId::from("t2");

        ledger.transfer_out(sender, 50, &txn).await.unwrap();
        ledger.transfer_out(sender, 50, &txn).await.unwrap();
        assert_eq!(ledger.wallet(sender).await.unwrap().frozen_balance(), 50);

        ledger.transfer_in(receiver, 50, &txn).await.unwrap();
        ledger.transfer_in(receiver, 50, &txn).await.unwrap();
        assert_eq!(
            ledger.wallet(receiver).await.unwrap().unreleased_balance(),
            50
        );

        ledger.confirm_transfer(&txn).await.unwrap();
        ledger.confirm_transfer(&txn).await.unwrap();
        assert_eq!(ledger.wallet(sender).await.unwrap().balance(), 50);
        assert_eq!(ledger.wallet(receiver).await.unwrap().balance(), 50);
    }

    #[tokio::test]
    async fn test_cancel_after_freeze_restores_sender() {
        let ledger = ledger();
        let sender = funded_wallet(&ledger, 100).await;
        let txn = TxnId::from("t3");

        ledger.transfer_out(sender, 50, &txn).await.unwrap();
        ledger
            .cancel_transfer(&txn, "receiver unavailable")
            .await
            .unwrap();

        let s = ledger.wallet(sender).await.unwrap();
        assert_eq!((s.balance(), s.frozen_balance()), (100, 0));

        let record = ledger.transaction(&txn).await.unwrap();
        assert_eq!(record.transfer_status, TransferStatus::Cancelled);
        assert_eq!(
            record.cancel_reason.as_deref(),
            Some("receiver unavailable")
        );
    }

    #[tokio::test]
    async fn test_cancel_after_credit_reverses_receiver() {
        let ledger = ledger();
        let sender = funded_wallet(&ledger, 100).await;
        let receiver = funded_wallet(&ledger, 0).await;
        let txn = TxnId::from("t4");

        ledger.transfer_out(sender, 30, &txn).await.unwrap();
        ledger.transfer_in(receiver, 30, &txn).await.unwrap();
        ledger.cancel_transfer(&txn, "confirm failed").await.unwrap();

        let s = ledger.wallet(sender).await.unwrap();
        let r = ledger.wallet(receiver).await.unwrap();
        assert_eq!((s.balance(), s.frozen_balance()), (100, 0));
        assert_eq!((r.balance(), r.unreleased_balance()), (0, 0));
    }

    #[tokio::test]
    async fn test_cancel_without_record_is_noop() {
        let ledger = ledger();
        ledger
            .cancel_transfer(&TxnId::from("ghost"), "whatever")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirm_without_credit_is_consistency_failure() {
        let ledger = ledger();
        let sender = funded_wallet(&ledger, 100).await;
        let txn = TxnId::from("t5");

        ledger.transfer_out(sender, 50, &txn).await.unwrap();

        let result = ledger.confirm_transfer(&txn).await;
        assert!(matches!(result, Err(LedgerError::NotReadyToConfirm(_))));
        assert!(result.unwrap_err().is_consistency_violation());
    }

    #[tokio::test]
    async fn test_cancel_then_confirm_does_not_double_reverse() {
        let ledger = ledger();
        let sender = funded_wallet(&ledger, 100).await;
        let receiver = funded_wallet(&ledger, 0).await;
        let txn = TxnId::from("t6");

        ledger.transfer_out(sender, 50, &txn).await.unwrap();
        ledger.transfer_in(receiver, 50, &txn).await.unwrap();

        ledger.cancel_transfer(&txn, "timeout").await.unwrap();
        // A late confirm must see the terminal record and leave balances alone.
        ledger.confirm_transfer(&txn).await.unwrap();

        let s = ledger.wallet(sender).await.unwrap();
        let r = ledger.wallet(receiver).await.unwrap();
        assert_eq!((s.balance(), s.frozen_balance()), (100, 0));
        assert_eq!((r.balance(), r.unreleased_balance()), (0, 0));
    }
}
