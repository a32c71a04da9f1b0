//! Transfer Saga
//!
//! Orchestration of the multi-step transfer protocol over the event bus.
//!
//! # State Machine
//!
//! ```text
//! PENDING →(freeze ok) FROZEN →(credit ok) [FROZEN, credit SUCCESS] →(confirm) SUCCESS
//!     ↓                    ↓                         ↓
//!     └────────────── CANCELLED ←──────────────────┘   (compensating path)
//! ```
//!
//! Terminal states: SUCCESS and CANCELLED. Each ledger step is independently
//! idempotent, so a redelivered intent resumes from the persisted record
//! state instead of double-applying effects.

pub mod api;
pub mod events;
pub mod orchestrator;
pub mod worker;

pub use api::{BalanceResponse, TransactionSummary, WalletApi};
pub use events::{
    TOPIC_TRANSFER_FAILED, TOPIC_TRANSFER_REQUEST, TOPIC_TRANSFER_ROLLBACK,
    TOPIC_TRANSFER_SUCCESS, TransferFailed, TransferOutcome, TransferRequested,
    TransferRolledBack, TransferSucceeded,
};
pub use orchestrator::TransferOrchestrator;
pub use worker::{IntentWorker, OutcomeWorker, WorkerConfig};
