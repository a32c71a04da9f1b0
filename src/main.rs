//! wallet_core service entry point
//!
//! Wires the core together: config → logging → stores → lock manager →
//! event bus → ledger → orchestrator workers, then waits for ctrl-c.
//!
//! The HTTP layer, notification delivery and audit persistence are external
//! collaborators; this binary hosts the ledger and the saga workers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use wallet_core::audit::LogAuditSink;
use wallet_core::bus::MemoryEventBus;
use wallet_core::config::AppConfig;
use wallet_core::ledger::postgres::{self, PgTransactionStore, PgWalletStore};
use wallet_core::ledger::store::{
    MemoryTransactionStore, MemoryWalletStore, TransactionStore, WalletStore,
};
use wallet_core::ledger::Ledger;
use wallet_core::lock::LeaseLockManager;
use wallet_core::logging::init_logging;
use wallet_core::registry::PushRegistry;
use wallet_core::saga::{IntentWorker, OutcomeWorker, TransferOrchestrator, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_or_default("config.yaml");
    let _log_guard = init_logging(&config);
    info!("Starting wallet_core");

    let (wallets, txns): (Arc<dyn WalletStore>, Arc<dyn TransactionStore>) =
        match &config.postgres_url {
            Some(url) => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(16)
                    .connect(url)
                    .await?;
                postgres::ensure_schema(&pool).await?;
                info!("Using PostgreSQL stores");
                (
                    Arc::new(PgWalletStore::new(pool.clone())) as Arc<dyn WalletStore>,
                    Arc::new(PgTransactionStore::new(pool)) as Arc<dyn TransactionStore>,
                )
            }
            None => {
                info!("No postgres_url configured, using in-memory stores");
                (
                    Arc::new(MemoryWalletStore::new()) as Arc<dyn WalletStore>,
                    Arc::new(MemoryTransactionStore::new()) as Arc<dyn TransactionStore>,
                )
            }
        };

    let locks = Arc::new(LeaseLockManager::new(Duration::from_millis(
        config.lock.poll_interval_ms,
    )));
    let audit = Arc::new(LogAuditSink);
    let bus = Arc::new(MemoryEventBus::new(config.bus.queue_size));
    let registry = Arc::new(PushRegistry::new());

    let ledger = Arc::new(Ledger::new(
        wallets,
        txns,
        locks,
        audit.clone(),
        Duration::from_millis(config.lock.lease_ms),
    ));
    let orchestrator = Arc::new(TransferOrchestrator::new(ledger.clone(), bus.clone()));

    let worker_config = WorkerConfig {
        max_attempts: config.bus.max_delivery_attempts,
        redelivery_delay: Duration::from_millis(config.bus.redelivery_delay_ms),
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let intent_worker = IntentWorker::new(
        orchestrator,
        bus.clone(),
        worker_config,
        shutdown_rx.clone(),
    );
    let outcome_worker = OutcomeWorker::new(
        ledger,
        audit,
        registry.clone(),
        bus,
        shutdown_rx,
    );

    let intent_handle = tokio::spawn(intent_worker.run());
    let outcome_handle = tokio::spawn(outcome_worker.run());
    info!("Saga workers running, press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown_tx.send(true)?;
    let _ = intent_handle.await;
    let _ = outcome_handle.await;
    registry.clear();

    info!("wallet_core stopped");
    Ok(())
}
