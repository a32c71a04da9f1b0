//! PostgreSQL Store Adapters
//!
//! sqlx-backed implementations of [`WalletStore`] and [`TransactionStore`].
//! Amounts are stored as BIGINT minor units; status axes as SMALLINT ids
//! (see [`super::state`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::error::LedgerError;
use super::state::{CreditStatus, TransferStatus};
use super::store::{TransactionStore, WalletStore};
use super::types::{OwnerId, TransactionRecord, TxnId, Wallet, WalletId};

/// Create the wallet/transaction tables if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), LedgerError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS wallets_tb (
            id UUID PRIMARY KEY,
            owner_id UUID NOT NULL UNIQUE,
            balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
            frozen_balance BIGINT NOT NULL DEFAULT 0 CHECK (frozen_balance >= 0),
            unreleased_balance BIGINT NOT NULL DEFAULT 0 CHECK (unreleased_balance >= 0),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions_tb (
            id UUID PRIMARY KEY,
            txn_id TEXT NOT NULL UNIQUE,
            from_wallet UUID,
            to_wallet UUID,
            amount BIGINT NOT NULL CHECK (amount > 0),
            transfer_status SMALLINT NOT NULL,
            credit_status SMALLINT NOT NULL,
            cancel_reason TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_from_wallet ON transactions_tb (from_wallet)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_transactions_to_wallet ON transactions_tb (to_wallet)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn amount_to_db(amount: u64) -> Result<i64, LedgerError> {
    i64::try_from(amount)
        .map_err(|_| LedgerError::BalanceInvariant(format!("amount {} exceeds BIGINT", amount)))
}

fn amount_from_db(value: i64, column: &str) -> Result<u64, LedgerError> {
    u64::try_from(value)
        .map_err(|_| LedgerError::Storage(format!("negative {} in storage: {}", column, value)))
}

pub struct PgWalletStore {
    pool: PgPool,
}

impl PgWalletStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_wallet(row: &PgRow) -> Result<Wallet, LedgerError> {
        Ok(Wallet::from_parts(
            row.try_get::<Uuid, _>("id")?,
            row.try_get::<Uuid, _>("owner_id")?,
            amount_from_db(row.try_get::<i64, _>("balance")?, "balance")?,
            amount_from_db(row.try_get::<i64, _>("frozen_balance")?, "frozen_balance")?,
            amount_from_db(
                row.try_get::<i64, _>("unreleased_balance")?,
                "unreleased_balance",
            )?,
            row.try_get::<DateTime<Utc>, _>("updated_at")?,
        ))
    }
}

#[async_trait]
impl WalletStore for PgWalletStore {
    async fn create(&self, wallet: &Wallet) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO wallets_tb (id, owner_id, balance, frozen_balance, unreleased_balance, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(wallet.id)
        .bind(wallet.owner_id)
        .bind(amount_to_db(wallet.balance())?)
        .bind(amount_to_db(wallet.frozen_balance())?)
        .bind(amount_to_db(wallet.unreleased_balance())?)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: WalletId) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query("SELECT * FROM wallets_tb WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    async fn find_by_owner(&self, owner_id: OwnerId) -> Result<Option<Wallet>, LedgerError> {
        let row = sqlx::query("SELECT * FROM wallets_tb WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    async fn save(&self, wallet: &Wallet) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE wallets_tb
            SET balance = $1, frozen_balance = $2, unreleased_balance = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(amount_to_db(wallet.balance())?)
        .bind(amount_to_db(wallet.frozen_balance())?)
        .bind(amount_to_db(wallet.unreleased_balance())?)
        .bind(wallet.updated_at)
        .bind(wallet.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::WalletNotFound(wallet.id));
        }
        Ok(())
    }
}

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> Result<TransactionRecord, LedgerError> {
        let transfer_id = row.try_get::<i16, _>("transfer_status")?;
        let credit_id = row.try_get::<i16, _>("credit_status")?;

        Ok(TransactionRecord {
            id: row.try_get::<Uuid, _>("id")?,
            txn_id: TxnId::from(row.try_get::<String, _>("txn_id")?),
            from_wallet: row.try_get::<Option<Uuid>, _>("from_wallet")?,
            to_wallet: row.try_get::<Option<Uuid>, _>("to_wallet")?,
            amount: amount_from_db(row.try_get::<i64, _>("amount")?, "amount")?,
            transfer_status: TransferStatus::from_id(transfer_id).ok_or_else(|| {
                LedgerError::Storage(format!("unknown transfer_status id {}", transfer_id))
            })?,
            credit_status: CreditStatus::from_id(credit_id).ok_or_else(|| {
                LedgerError::Storage(format!("unknown credit_status id {}", credit_id))
            })?,
            cancel_reason: row.try_get::<Option<String>, _>("cancel_reason")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions_tb
                (id, txn_id, from_wallet, to_wallet, amount, transfer_status, credit_status,
                 cancel_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (txn_id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.txn_id.as_str())
        .bind(record.from_wallet)
        .bind(record.to_wallet)
        .bind(amount_to_db(record.amount)?)
        .bind(record.transfer_status.id())
        .bind(record.credit_status.id())
        .bind(&record.cancel_reason)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::DuplicateTransaction(record.txn_id.clone()));
        }
        Ok(())
    }

    async fn get(&self, txn_id: &TxnId) -> Result<Option<TransactionRecord>, LedgerError> {
        let row = sqlx::query("SELECT * FROM transactions_tb WHERE txn_id = $1")
            .bind(txn_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn save(&self, record: &TransactionRecord) -> Result<(), LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE transactions_tb
            SET from_wallet = $1, to_wallet = $2, transfer_status = $3, credit_status = $4,
                cancel_reason = $5, updated_at = $6
            WHERE txn_id = $7
            "#,
        )
        .bind(record.from_wallet)
        .bind(record.to_wallet)
        .bind(record.transfer_status.id())
        .bind(record.credit_status.id())
        .bind(&record.cancel_reason)
        .bind(record.updated_at)
        .bind(record.txn_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::TransactionNotFound(record.txn_id.clone()));
        }
        Ok(())
    }

    async fn history_for_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM transactions_tb
            WHERE from_wallet = $1 OR to_wallet = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(wallet_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_record).collect()
    }
}
