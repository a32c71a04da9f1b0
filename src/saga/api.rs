//! Synchronous Wallet API
//!
//! The surface the external HTTP layer calls into. Intent creation is the
//! only write with asynchronous completion: the caller gets a transaction id
//! back immediately and observes success/failure later via the outcome
//! topics or a status query.
//!
//! Amounts cross this boundary as strings and are parsed to minor units
//! here; everything past this layer is integer arithmetic.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use super::events::{TOPIC_TRANSFER_REQUEST, TransferRequested};
use crate::audit::AuditSink;
use crate::bus::EventBus;
use crate::ledger::{Ledger, LedgerError, OwnerId, TransactionRecord, TxnId, WalletId};
use crate::money;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub wallet_id: String,
    pub balance: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    pub txn_id: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub amount: String,
    pub status: String,
    pub credit_status: String,
    pub cancel_reason: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub struct WalletApi {
    ledger: Arc<Ledger>,
    bus: Arc<dyn EventBus>,
    audit: Arc<dyn AuditSink>,
    decimals: u32,
}

impl WalletApi {
    pub fn new(
        ledger: Arc<Ledger>,
        bus: Arc<dyn EventBus>,
        audit: Arc<dyn AuditSink>,
        decimals: u32,
    ) -> Self {
        Self {
            ledger,
            bus,
            audit,
            decimals,
        }
    }

    pub async fn create_wallet(&self, owner_id: OwnerId) -> Result<WalletId, LedgerError> {
        Ok(self.ledger.create_wallet(owner_id).await?.id)
    }

    /// Persist a PENDING record, then publish the intent event.
    ///
    /// The transfer itself runs asynchronously in the saga workers.
    pub async fn create_transfer_intent(
        &self,
        from: WalletId,
        to: WalletId,
        amount: &str,
    ) -> Result<TxnId, LedgerError> {
        if from == to {
            return Err(LedgerError::SameWallet);
        }
        let amount = self.parse_amount(amount)?;

        // Both wallets must exist before we promise anything.
        self.ledger.wallet(from).await?;
        self.ledger.wallet(to).await?;

        let txn_id = TxnId::generate();
        self.ledger.record_intent(from, to, amount, &txn_id).await?;

        let event = TransferRequested {
            from_wallet: from,
            to_wallet: to,
            amount,
            txn_id: txn_id.clone(),
        };
        self.bus
            .publish(
                TOPIC_TRANSFER_REQUEST,
                txn_id.as_str(),
                serde_json::to_value(&event)
                    .map_err(|e| LedgerError::EventPublish(e.to_string()))?,
            )
            .await?;

        self.audit
            .record(
                "TRANSFER_INITIATED",
                &txn_id,
                serde_json::json!({"from": from, "to": to, "amount": amount}),
            )
            .await;
        info!(%txn_id, from = %from, to = %to, amount, "Transfer intent created");
        Ok(txn_id)
    }

    /// Single-wallet deposit: no saga needed, the ledger call is atomic.
    pub async fn top_up(&self, wallet_id: WalletId, amount: &str) -> Result<TxnId, LedgerError> {
        let amount = self.parse_amount(amount)?;
        let txn_id = TxnId::generate();
        self.ledger.top_up(wallet_id, amount, &txn_id).await?;
        Ok(txn_id)
    }

    pub async fn get_balance(&self, wallet_id: WalletId) -> Result<BalanceResponse, LedgerError> {
        let wallet = self.ledger.wallet(wallet_id).await?;
        Ok(BalanceResponse {
            wallet_id: wallet.id.to_string(),
            balance: money::format_amount(wallet.balance(), self.decimals),
        })
    }

    /// Transaction summaries touching a wallet, most recent first.
    pub async fn get_transaction_history(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionSummary>, LedgerError> {
        let records = self.ledger.history(wallet_id).await?;
        Ok(records
            .iter()
            .map(|record| self.summarize(record))
            .collect())
    }

    pub async fn get_transaction_details(
        &self,
        txn_id: &TxnId,
    ) -> Result<TransactionSummary, LedgerError> {
        let record = self.ledger.transaction(txn_id).await?;
        Ok(self.summarize(&record))
    }

    fn summarize(&self, record: &TransactionRecord) -> TransactionSummary {
        let wallet_or_system =
            |id: Option<WalletId>| id.map_or_else(|| "SYSTEM".to_string(), |id| id.to_string());
        TransactionSummary {
            txn_id: record.txn_id.to_string(),
            from_wallet: wallet_or_system(record.from_wallet),
            to_wallet: wallet_or_system(record.to_wallet),
            amount: money::format_amount(record.amount, self.decimals),
            status: record.transfer_status.to_string(),
            credit_status: record.credit_status.to_string(),
            cancel_reason: record.cancel_reason.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn parse_amount(&self, amount: &str) -> Result<u64, LedgerError> {
        money::parse_amount(amount, self.decimals).map_err(|e| {
            tracing::debug!(error = %e, "Amount rejected");
            LedgerError::InvalidAmount
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::LogAuditSink;
    use crate::bus::MemoryEventBus;
    use crate::ledger::store::{MemoryTransactionStore, MemoryWalletStore};
    use crate::ledger::TransferStatus;
    use crate::lock::LeaseLockManager;
    use std::time::Duration;
    use uuid::Uuid;

    fn api_with_bus() -> (WalletApi, Arc<MemoryEventBus>) {
        let ledger = Arc::new(Ledger::new(
            Arc::new(MemoryWalletStore::new()),
            Arc::new(MemoryTransactionStore::new()),
            Arc::new(LeaseLockManager::new(Duration::from_millis(5))),
            Arc::new(LogAuditSink),
            Duration::from_secs(2),
        ));
        let bus = Arc::new(MemoryEventBus::new(64));
        let api = WalletApi::new(ledger, bus.clone(), Arc::new(LogAuditSink), 2);
        (api, bus)
    }

    #[tokio::test]
    async fn test_top_up_and_balance() {
        let (api, _bus) = api_with_bus();
        let wallet = api.create_wallet(Uuid::new_v4()).await.unwrap();

        api.top_up(wallet, "100.00").await.unwrap();

        let balance = api.get_balance(wallet).await.unwrap();
        assert_eq!(balance.balance, "100.00");
    }

    #[tokio::test]
    async fn test_create_intent_publishes_event() {
        let (api, bus) = api_with_bus();
        let mut rx = bus.subscribe(TOPIC_TRANSFER_REQUEST);

        let from = api.create_wallet(Uuid::new_v4()).await.unwrap();
        let to = api.create_wallet(Uuid::new_v4()).await.unwrap();
        api.top_up(from, "100").await.unwrap();

        let txn_id = api.create_transfer_intent(from, to, "25.50").await.unwrap();

        // PENDING record persisted synchronously
        let details = api.get_transaction_details(&txn_id).await.unwrap();
        assert_eq!(details.status, TransferStatus::Pending.to_string());
        assert_eq!(details.amount, "25.50");

        // Intent event keyed by the transaction id
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.key, txn_id.as_str());
    }

    #[tokio::test]
    async fn test_create_intent_validation() {
        let (api, _bus) = api_with_bus();
        let from = api.create_wallet(Uuid::new_v4()).await.unwrap();
        let to = api.create_wallet(Uuid::new_v4()).await.unwrap();

        assert!(matches!(
            api.create_transfer_intent(from, from, "10").await,
            Err(LedgerError::SameWallet)
        ));
        assert!(matches!(
            api.create_transfer_intent(from, to, "0").await,
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            api.create_transfer_intent(from, to, "-5").await,
            Err(LedgerError::InvalidAmount)
        ));
        assert!(matches!(
            api.create_transfer_intent(Uuid::new_v4(), to, "10").await,
            Err(LedgerError::WalletNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_history_most_recent_first_with_system_placeholder() {
        let (api, _bus) = api_with_bus();
        let wallet = api.create_wallet(Uuid::new_v4()).await.unwrap();

        api.top_up(wallet, "10").await.unwrap();
        api.top_up(wallet, "20").await.unwrap();

        let history = api.get_transaction_history(wallet).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].created_at >= history[1].created_at);
        // Deposits have no source wallet
        assert_eq!(history[0].from_wallet, "SYSTEM");
    }

    #[tokio::test]
    async fn test_details_for_unknown_txn() {
        let (api, _bus) = api_with_bus();
        assert!(matches!(
            api.get_transaction_details(&TxnId::from("nope")).await,
            Err(LedgerError::TransactionNotFound(_))
        ));
    }
}
