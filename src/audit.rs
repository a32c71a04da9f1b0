//! Audit sink
//!
//! Compliance logging for balance-moving events. The sink is strictly
//! fire-and-forget: `record` never returns an error, and a failing sink must
//! never abort or roll back the ledger operation that called it.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::ledger::types::TxnId;

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record an audit event. Failures are swallowed and logged internally.
    async fn record(&self, action: &str, txn_id: &TxnId, fields: Value);
}

/// Audit sink backed by the tracing pipeline under the `audit` target.
///
/// Durable persistence of audit rows is an external collaborator; this sink
/// hands events to the structured log stream it consumes.
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, action: &str, txn_id: &TxnId, fields: Value) {
        info!(
            target: "audit",
            action,
            txn_id = %txn_id,
            fields = %fields,
            "audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_does_not_panic() {
        let sink = LogAuditSink;
        let txn = TxnId::from("t1");
        sink.record("TOP_UP", &txn, json!({"amount": 100})).await;
    }
}
