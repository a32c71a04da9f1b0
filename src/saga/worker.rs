//! Saga Workers
//!
//! Bus consumers running as background tasks:
//!
//! - [`IntentWorker`] drives the orchestrator over the intent topic and owns
//!   the redelivery policy for retryable failures.
//! - [`OutcomeWorker`] consumes terminal outcome topics, records audit
//!   entries and pushes notices to the initiating owner's live sessions.
//!
//! Workers across processes parallelize across transaction ids; ordering is
//! only preserved within one id's event stream, which the ledger's
//! idempotency makes sufficient.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::events::{
    TOPIC_TRANSFER_FAILED, TOPIC_TRANSFER_REQUEST, TOPIC_TRANSFER_ROLLBACK,
    TOPIC_TRANSFER_SUCCESS, TransferFailed, TransferRequested, TransferRolledBack,
    TransferSucceeded,
};
use super::orchestrator::TransferOrchestrator;
use crate::audit::AuditSink;
use crate::bus::{Envelope, EventBus};
use crate::ledger::{Ledger, TxnId};
use crate::registry::{OutcomeNotice, PushRegistry};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum delivery attempts for one intent before it is dropped.
    pub max_attempts: u32,
    /// Delay before redelivering after a retryable failure.
    pub redelivery_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            redelivery_delay: Duration::from_millis(500),
        }
    }
}

pub struct IntentWorker {
    orchestrator: Arc<TransferOrchestrator>,
    bus: Arc<dyn EventBus>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
    rx: tokio::sync::mpsc::Receiver<Envelope>,
}

impl IntentWorker {
    /// Subscribes to the intent topic immediately, so intents published
    /// after construction are never lost to a not-yet-running task.
    pub fn new(
        orchestrator: Arc<TransferOrchestrator>,
        bus: Arc<dyn EventBus>,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let rx = bus.subscribe(TOPIC_TRANSFER_REQUEST);
        Self {
            orchestrator,
            bus,
            config,
            shutdown,
            rx,
        }
    }

    pub async fn run(mut self) {
        info!("Intent worker started");

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                received = self.rx.recv() => {
                    match received {
                        Some(envelope) => self.process(envelope).await,
                        None => break,
                    }
                }
            }
        }
        info!("Intent worker stopped");
    }

    async fn process(&self, envelope: Envelope) {
        let event: TransferRequested = match serde_json::from_value(envelope.payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                error!(key = %envelope.key, error = %e, "Malformed transfer intent dropped");
                return;
            }
        };

        match self.orchestrator.handle(&event).await {
            Ok(outcome) => {
                debug!(txn_id = %event.txn_id, ?outcome, attempt = envelope.attempt, "Intent resolved");
            }
            Err(e) => {
                // Retryable: the failed step was not applied.
                if envelope.attempt >= self.config.max_attempts {
                    error!(
                        txn_id = %event.txn_id,
                        attempts = envelope.attempt,
                        error = %e,
                        "Giving up on transfer intent after max delivery attempts"
                    );
                    return;
                }
                warn!(
                    txn_id = %event.txn_id,
                    attempt = envelope.attempt,
                    error = %e,
                    "Retryable failure, redelivering intent"
                );
                tokio::time::sleep(self.config.redelivery_delay).await;
                if let Err(redeliver_err) = self.bus.redeliver(envelope).await {
                    error!(txn_id = %event.txn_id, error = %redeliver_err, "Redelivery failed");
                }
            }
        }
    }
}

pub struct OutcomeWorker {
    ledger: Arc<Ledger>,
    audit: Arc<dyn AuditSink>,
    registry: Arc<PushRegistry>,
    shutdown: watch::Receiver<bool>,
    success_rx: tokio::sync::mpsc::Receiver<Envelope>,
    failed_rx: tokio::sync::mpsc::Receiver<Envelope>,
    rollback_rx: tokio::sync::mpsc::Receiver<Envelope>,
}

impl OutcomeWorker {
    /// Subscribes to all three outcome topics immediately (see
    /// [`IntentWorker::new`]).
    pub fn new(
        ledger: Arc<Ledger>,
        audit: Arc<dyn AuditSink>,
        registry: Arc<PushRegistry>,
        bus: Arc<dyn EventBus>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let success_rx = bus.subscribe(TOPIC_TRANSFER_SUCCESS);
        let failed_rx = bus.subscribe(TOPIC_TRANSFER_FAILED);
        let rollback_rx = bus.subscribe(TOPIC_TRANSFER_ROLLBACK);
        Self {
            ledger,
            audit,
            registry,
            shutdown,
            success_rx,
            failed_rx,
            rollback_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Outcome worker started");

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                received = self.success_rx.recv() => {
                    let Some(envelope) = received else { break };
                    if let Ok(event) = serde_json::from_value::<TransferSucceeded>(envelope.payload) {
                        self.handle_outcome(
                            "TRANSFER_SUCCESS",
                            &event.txn_id,
                            "Transfer completed".to_string(),
                        )
                        .await;
                    }
                }
                received = self.failed_rx.recv() => {
                    let Some(envelope) = received else { break };
                    if let Ok(event) = serde_json::from_value::<TransferFailed>(envelope.payload) {
                        self.handle_outcome(
                            "TRANSFER_FAILED",
                            &event.txn_id,
                            format!("Transfer failed: {}", event.reason),
                        )
                        .await;
                    }
                }
                received = self.rollback_rx.recv() => {
                    let Some(envelope) = received else { break };
                    if let Ok(event) = serde_json::from_value::<TransferRolledBack>(envelope.payload) {
                        self.handle_outcome(
                            "TRANSFER_ROLLBACK",
                            &event.txn_id,
                            format!("Transfer rolled back: {}", event.reason),
                        )
                        .await;
                    }
                }
            }
        }
        info!("Outcome worker stopped");
    }

    async fn handle_outcome(&self, event_type: &str, txn_id: &TxnId, message: String) {
        let record = match self.ledger.transaction(txn_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%txn_id, error = %e, "Outcome for unknown transaction");
                None
            }
        };

        self.audit
            .record(
                event_type,
                txn_id,
                json!({
                    "status": record.as_ref().map(|r| r.transfer_status.as_str()),
                    "cancel_reason": record.as_ref().and_then(|r| r.cancel_reason.clone()),
                }),
            )
            .await;

        // Notify the initiating owner's live sessions, if any.
        let Some(record) = record else { return };
        let Some(from_wallet) = record.from_wallet else {
            return;
        };
        match self.ledger.wallet(from_wallet).await {
            Ok(wallet) => {
                self.registry.send_to_owner(
                    wallet.owner_id,
                    OutcomeNotice {
                        txn_id: txn_id.to_string(),
                        status: event_type.to_string(),
                        message,
                    },
                );
            }
            Err(e) => warn!(%txn_id, error = %e, "Sender wallet lookup failed for notification"),
        }
    }
}
