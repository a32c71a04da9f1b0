//! wallet_core - Wallet Ledger & Transfer Saga
//!
//! Account holders hold a balance and move funds between wallets safely
//! under concurrent access and partial failures. A transfer runs as a saga:
//! freeze on the sender, credit on the receiver, then confirm (settle) — or
//! a compensating cancel — driven by at-least-once event delivery.
//!
//! # Modules
//!
//! - [`config`] - YAML application configuration
//! - [`logging`] - tracing init (rolling file + stdout)
//! - [`money`] - minor-unit amount parsing/formatting
//! - [`lock`] - lease-based exclusive locks keyed by resource id
//! - [`registry`] - live push-session registry for outcome notices
//! - [`audit`] - fire-and-forget compliance event sink
//! - [`bus`] - at-least-once, key-ordered pub/sub abstraction
//! - [`ledger`] - wallet balance engine and transaction records
//! - [`saga`] - transfer orchestration, workers and the sync API surface

pub mod audit;
pub mod bus;
pub mod config;
pub mod ledger;
pub mod lock;
pub mod logging;
pub mod money;
pub mod registry;
pub mod saga;

// Convenient re-exports at crate root
pub use audit::{AuditSink, LogAuditSink};
pub use bus::{EventBus, MemoryEventBus};
pub use config::AppConfig;
pub use ledger::{
    CreditStatus, Ledger, LedgerError, TransactionRecord, TransferStatus, TxnId, Wallet, WalletId,
};
pub use lock::{LeaseLockManager, LockError, LockGuard, LockManager};
pub use registry::{OutcomeNotice, PushRegistry};
pub use saga::{
    IntentWorker, OutcomeWorker, TransferOrchestrator, TransferRequested, WalletApi, WorkerConfig,
};
