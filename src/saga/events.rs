//! Transfer Event Types
//!
//! Wire payloads for the saga topics. Intent events are keyed by the
//! business transaction id so redeliveries of the same transfer land on the
//! same partition, in order.

use serde::{Deserialize, Serialize};

use crate::ledger::types::{TxnId, WalletId};

pub const TOPIC_TRANSFER_REQUEST: &str = "transfer.events.request";
pub const TOPIC_TRANSFER_SUCCESS: &str = "transfer.events.success";
pub const TOPIC_TRANSFER_FAILED: &str = "transfer.events.failed";
pub const TOPIC_TRANSFER_ROLLBACK: &str = "transfer.events.rollback";

/// Inbound transfer intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequested {
    pub from_wallet: WalletId,
    pub to_wallet: WalletId,
    pub amount: u64,
    pub txn_id: TxnId,
}

/// Terminal outcome: funds moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSucceeded {
    pub txn_id: TxnId,
}

/// Terminal outcome: rejected at the freeze step, nothing was mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferFailed {
    pub txn_id: TxnId,
    pub reason: String,
}

/// Terminal outcome: partially applied steps were compensated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRolledBack {
    pub txn_id: TxnId,
    pub reason: String,
}

/// What the orchestrator resolved a consumed intent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded,
    Failed(String),
    RolledBack(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_intent_roundtrip() {
        let event = TransferRequested {
            from_wallet: Uuid::new_v4(),
            to_wallet: Uuid::new_v4(),
            amount: 5_000,
            txn_id: TxnId::from("t1"),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["amount"], 5_000);
        assert_eq!(value["txn_id"], "t1");

        let decoded: TransferRequested = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.txn_id, event.txn_id);
        assert_eq!(decoded.from_wallet, event.from_wallet);
    }
}
