//! Wallet Ledger
//!
//! Balance-mutation core: wallets with settled/frozen/unreleased balances,
//! the per-transfer transaction record (idempotency source), and the five
//! operations that move funds:
//!
//! ```text
//! top_up            single-phase deposit (terminal immediately)
//! transfer_out      freeze:  sender hold raised, balance untouched
//! transfer_in       credit:  receiver unreleased raised, not spendable
//! confirm_transfer  settle:  hold consumed, credit released
//! cancel_transfer   compensate: reverse whatever was applied
//! ```
//!
//! # Safety Invariants
//!
//! 1. Balances never go negative: checked arithmetic rejects underflow
//!    before mutation
//! 2. Idempotency: each operation no-ops when the record shows its step was
//!    already applied
//! 3. One wallet lock per mutation; confirm/cancel serialize on the
//!    transaction lock

pub mod engine;
pub mod error;
pub mod postgres;
pub mod state;
pub mod store;
pub mod types;

pub use engine::Ledger;
pub use error::LedgerError;
pub use state::{CreditStatus, TransferStatus};
pub use store::{MemoryTransactionStore, MemoryWalletStore, TransactionStore, WalletStore};
pub use types::{OwnerId, TransactionRecord, TxnId, Wallet, WalletId};
