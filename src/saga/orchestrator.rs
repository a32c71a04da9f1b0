//! Transfer Saga Orchestrator
//!
//! Drives a consumed transfer intent through freeze → credit → confirm, or
//! down the compensating path on failure. Every non-retryable outcome ends
//! in a published terminal event; nothing escapes uncaught.
//!
//! Retryable errors (lock lease exceeded, storage blips) are the one
//! exception: the operation was not applied, so the orchestrator surfaces
//! them to the worker, which redelivers the intent instead of publishing a
//! terminal outcome.
//!
//! Because every ledger step is independently idempotent, redelivery of the
//! same intent resumes from the persisted record state rather than
//! double-applying effects.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::events::{
    TOPIC_TRANSFER_FAILED, TOPIC_TRANSFER_ROLLBACK, TOPIC_TRANSFER_SUCCESS, TransferFailed,
    TransferOutcome, TransferRequested, TransferRolledBack, TransferSucceeded,
};
use crate::bus::EventBus;
use crate::ledger::{Ledger, LedgerError, TxnId};

pub struct TransferOrchestrator {
    ledger: Arc<Ledger>,
    bus: Arc<dyn EventBus>,
}

impl TransferOrchestrator {
    pub fn new(ledger: Arc<Ledger>, bus: Arc<dyn EventBus>) -> Self {
        Self { ledger, bus }
    }

    /// Process one transfer intent to a terminal outcome.
    ///
    /// Returns `Err` only for retryable errors; the caller is expected to
    /// redeliver the intent.
    pub async fn handle(&self, event: &TransferRequested) -> Result<TransferOutcome, LedgerError> {
        let txn_id = &event.txn_id;
        debug!(%txn_id, from = %event.from_wallet, to = %event.to_wallet, amount = event.amount, "Processing transfer intent");

        // Step 1: freeze. A validation failure here means nothing was
        // mutated; the record is marked terminal and a failure outcome goes
        // out, with no compensation of balances needed.
        if let Err(e) = self
            .ledger
            .transfer_out(event.from_wallet, event.amount, txn_id)
            .await
        {
            if e.is_retryable() {
                return Err(e);
            }
            let reason = e.to_string();
            warn!(%txn_id, error = %reason, "Freeze step rejected");
            if let Err(cancel_err) = self.ledger.cancel_transfer(txn_id, &reason).await {
                error!(%txn_id, error = %cancel_err, "Failed to mark rejected transfer cancelled");
            }
            self.publish_failed(txn_id, &reason).await;
            return Ok(TransferOutcome::Failed(reason));
        }

        // Step 2: credit
        if let Err(e) = self
            .ledger
            .transfer_in(event.to_wallet, event.amount, txn_id)
            .await
        {
            if e.is_retryable() {
                return Err(e);
            }
            return Ok(self.compensate(txn_id, "credit", e).await);
        }

        // Step 3: settle
        if let Err(e) = self.ledger.confirm_transfer(txn_id).await {
            if e.is_retryable() {
                return Err(e);
            }
            return Ok(self.compensate(txn_id, "confirm", e).await);
        }

        self.publish(
            TOPIC_TRANSFER_SUCCESS,
            txn_id,
            json!(TransferSucceeded {
                txn_id: txn_id.clone()
            }),
        )
        .await;
        info!(%txn_id, "Transfer completed");
        Ok(TransferOutcome::Succeeded)
    }

    /// Reverse applied steps and publish a rollback outcome.
    ///
    /// Internal-consistency failures are the exception: they indicate a
    /// protocol violation, not a transient fault, so they are flagged for
    /// manual investigation instead of auto-compensated.
    async fn compensate(&self, txn_id: &TxnId, step: &str, cause: LedgerError) -> TransferOutcome {
        let reason = format!("{} step failed: {}", step, cause);

        if cause.is_consistency_violation() {
            error!(%txn_id, error = %cause, "PROTOCOL VIOLATION - transfer left for manual investigation");
        } else {
            warn!(%txn_id, error = %cause, "Compensating transfer");
            if let Err(e) = self.ledger.cancel_transfer(txn_id, &reason).await {
                // Compensation itself failed; the record stays non-terminal
                // and redelivery will retry the cancel.
                error!(%txn_id, error = %e, "Compensation failed");
            }
        }

        self.publish(
            TOPIC_TRANSFER_ROLLBACK,
            txn_id,
            json!(TransferRolledBack {
                txn_id: txn_id.clone(),
                reason: reason.clone(),
            }),
        )
        .await;
        TransferOutcome::RolledBack(reason)
    }

    async fn publish_failed(&self, txn_id: &TxnId, reason: &str) {
        self.publish(
            TOPIC_TRANSFER_FAILED,
            txn_id,
            json!(TransferFailed {
                txn_id: txn_id.clone(),
                reason: reason.to_string(),
            }),
        )
        .await;
    }

    async fn publish(&self, topic: &str, txn_id: &TxnId, payload: serde_json::Value) {
        if let Err(e) = self.bus.publish(topic, txn_id.as_str(), payload).await {
            // Outcome consumers are external; losing an outcome event must
            // not fail the saga whose ledger effects are already durable.
            error!(%txn_id, topic, error = %e, "Failed to publish outcome event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::LogAuditSink;
    use crate::bus::MemoryEventBus;
    use crate::ledger::store::{MemoryTransactionStore, MemoryWalletStore};
    use crate::ledger::{TransferStatus, WalletId};
    use crate::lock::LeaseLockManager;
    use std::time::Duration;
    use uuid::Uuid;

    struct Harness {
        ledger: Arc<Ledger>,
        bus: Arc<MemoryEventBus>,
        orchestrator: TransferOrchestrator,
    }

    fn harness() -> Harness {
        let ledger = Arc::new(Ledger::new(
            Arc::new(MemoryWalletStore::new()),
            Arc::new(MemoryTransactionStore::new()),
            Arc::new(LeaseLockManager::new(Duration::from_millis(5))),
            Arc::new(LogAuditSink),
            Duration::from_secs(2),
        ));
        let bus = Arc::new(MemoryEventBus::new(64));
        let orchestrator = TransferOrchestrator::new(ledger.clone(), bus.clone());
        Harness {
            ledger,
            bus,
            orchestrator,
        }
    }

    impl Harness {
        async fn wallet_with(&self, balance: u64) -> WalletId {
            let wallet = self.ledger.create_wallet(Uuid::new_v4()).await.unwrap();
            if balance > 0 {
                self.ledger
                    .top_up(wallet.id, balance, &TxnId::generate())
                    .await
                    .unwrap();
            }
            wallet.id
        }

        async fn intent(&self, from: WalletId, to: WalletId, amount: u64) -> TransferRequested {
            let txn_id = TxnId::generate();
            self.ledger
                .record_intent(from, to, amount, &txn_id)
                .await
                .unwrap();
            TransferRequested {
                from_wallet: from,
                to_wallet: to,
                amount,
                txn_id,
            }
        }
    }

    #[tokio::test]
    async fn test_happy_path_publishes_success() {
        let h = harness();
        let mut success_rx = h.bus.subscribe(TOPIC_TRANSFER_SUCCESS);

        let from = h.wallet_with(100).await;
        let to = h.wallet_with(0).await;
        let event = h.intent(from, to, 50).await;

        let outcome = h.orchestrator.handle(&event).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Succeeded);

        assert_eq!(h.ledger.wallet(from).await.unwrap().balance(), 50);
        assert_eq!(h.ledger.wallet(to).await.unwrap().balance(), 50);

        let published = success_rx.recv().await.unwrap();
        assert_eq!(published.key, event.txn_id.as_str());
    }

    #[tokio::test]
    async fn test_insufficient_balance_publishes_failed() {
        let h = harness();
        let mut failed_rx = h.bus.subscribe(TOPIC_TRANSFER_FAILED);

        let from = h.wallet_with(10).await;
        let to = h.wallet_with(0).await;
        let event = h.intent(from, to, 50).await;

        let outcome = h.orchestrator.handle(&event).await.unwrap();
        assert!(matches!(outcome, TransferOutcome::Failed(_)));

        // Nothing moved; the record reached a terminal state with a reason.
        assert_eq!(h.ledger.wallet(from).await.unwrap().balance(), 10);
        let record = h.ledger.transaction(&event.txn_id).await.unwrap();
        assert_eq!(record.transfer_status, TransferStatus::Cancelled);
        assert!(record.cancel_reason.is_some());

        assert!(failed_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_credit_failure_compensates_and_publishes_rollback() {
        let h = harness();
        let mut rollback_rx = h.bus.subscribe(TOPIC_TRANSFER_ROLLBACK);

        let from = h.wallet_with(100).await;
        // Receiver wallet does not exist: credit step hits not-found.
        let event = h.intent(from, Uuid::new_v4(), 40).await;

        let outcome = h.orchestrator.handle(&event).await.unwrap();
        assert!(matches!(outcome, TransferOutcome::RolledBack(_)));

        // The freeze was reversed.
        let sender = h.ledger.wallet(from).await.unwrap();
        assert_eq!((sender.balance(), sender.frozen_balance()), (100, 0));

        let record = h.ledger.transaction(&event.txn_id).await.unwrap();
        assert_eq!(record.transfer_status, TransferStatus::Cancelled);

        assert!(rollback_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_redelivered_intent_applies_once() {
        let h = harness();
        let from = h.wallet_with(100).await;
        let to = h.wallet_with(0).await;
        let event = h.intent(from, to, 50).await;

        h.orchestrator.handle(&event).await.unwrap();
        let outcome = h.orchestrator.handle(&event).await.unwrap();
        assert_eq!(outcome, TransferOutcome::Succeeded);

        assert_eq!(h.ledger.wallet(from).await.unwrap().balance(), 50);
        assert_eq!(h.ledger.wallet(to).await.unwrap().balance(), 50);
    }
}
