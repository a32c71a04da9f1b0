//! Repository Layer
//!
//! Explicit stores for wallet and transaction rows. All loads and saves are
//! explicit calls; nothing is fetched as a side effect of field access. The
//! ledger engine owns all mutation; stores only persist.
//!
//! The in-memory adapters back tests and single-node deployments; the
//! PostgreSQL adapters in [`super::postgres`] implement the same traits.

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::LedgerError;
use super::types::{OwnerId, TransactionRecord, TxnId, Wallet, WalletId};

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn create(&self, wallet: &Wallet) -> Result<(), LedgerError>;
    async fn get(&self, id: WalletId) -> Result<Option<Wallet>, LedgerError>;
    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Wallet>, LedgerError>;
    async fn save(&self, wallet: &Wallet) -> Result<(), LedgerError>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new record; fails on a duplicate business transaction id.
    async fn insert(&self, record: &TransactionRecord) -> Result<(), LedgerError>;
    async fn get(&self, txn_id: &TxnId) -> Result<Option<TransactionRecord>, LedgerError>;
    async fn save(&self, record: &TransactionRecord) -> Result<(), LedgerError>;
    /// All records touching a wallet (either side), most recent first.
    async fn history_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError>;
}

// ============================================================================
// In-memory adapters
// ============================================================================

#[derive(Default)]
pub struct MemoryWalletStore {
    wallets: DashMap<WalletId, Wallet>,
}

impl MemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn create(&self, wallet: &Wallet) -> Result<(), LedgerError> {
        self.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn get(&self, id: WalletId) -> Result<Option<Wallet>, LedgerError> {
        Ok(self.wallets.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Wallet>, LedgerError> {
        Ok(self
            .wallets
            .iter()
            .find(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, wallet: &Wallet) -> Result<(), LedgerError> {
        self.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTransactionStore {
    records: DashMap<TxnId, TransactionRecord>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        if self.records.contains_key(&record.txn_id) {
            return Err(LedgerError::DuplicateTransaction(record.txn_id.clone()));
        }
        self.records.insert(record.txn_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, txn_id: &TxnId) -> Result<Option<TransactionRecord>, LedgerError> {
        Ok(self.records.get(txn_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        self.records.insert(record.txn_id.clone(), record.clone());
        Ok(())
    }

    async fn history_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut records: Vec<TransactionRecord> = self
            .records
            .iter()
            .filter(|entry| {
                let record = entry.value();
                record.from_wallet == Some(wallet_id) || record.to_wallet == Some(wallet_id)
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_wallet_store_roundtrip() {
        let store = MemoryWalletStore::new();
        let owner = Uuid::new_v4();
        let wallet = Wallet::new(owner);
        let id = wallet.id;

        store.create(&wallet).await.unwrap();
        assert!(store.get(id).await.unwrap().is_some());
        assert_eq!(
            store.find_by_owner(owner).await.unwrap().map(|w| w.id),
            Some(id)
        );
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_store_duplicate_insert() {
        let store = MemoryTransactionStore::new();
        let record =
            TransactionRecord::new_topup(TxnId::from("t1"), Uuid::new_v4(), 100);

        store.insert(&record).await.unwrap();
        assert!(matches!(
            store.insert(&record).await,
            Err(LedgerError::DuplicateTransaction(_))
        ));
    }

    #[tokio::test]
    async fn test_history_most_recent_first() {
        let store = MemoryTransactionStore::new();
        let wallet_id = Uuid::new_v4();

        for n in 0..3 {
            let record = TransactionRecord::new_topup(
                TxnId::from(format!("t{}", n).as_str()),
                wallet_id,
                100,
            );
            store.insert(&record).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let history = store.history_for_wallet(wallet_id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].created_at >= history[1].created_at);
        assert!(history[1].created_at >= history[2].created_at);
    }
}
