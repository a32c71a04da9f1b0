//! Lease-Based Lock Manager
//!
//! Exclusive, non-reentrant locks keyed by resource id (wallet id or
//! transaction id). Every lock carries a bounded lease: if the holder crashes
//! or never releases, the key becomes acquirable again once the lease
//! expires, so a failed worker can never block a resource indefinitely.
//!
//! `acquire` blocks, polling, for up to the lease duration waiting for the
//! key to become free, then fails with [`LockError::Timeout`]. The timeout is
//! retryable: callers rely on event redelivery rather than looping here.
//!
//! The guard releases on drop, which covers every exit path of the caller's
//! critical section including error paths. Release is fenced by a holder
//! token: a guard whose lease already expired (and whose key was taken over)
//! cannot release the successor's lock.
//!
//! [`LeaseLockManager`] is the in-process implementation; a cluster-wide
//! lease lock service slots behind the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Timed out acquiring lock for {0}")]
    Timeout(String),
}

/// Exclusive lease-bounded lock manager.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Acquire the lock for `key`, waiting up to `lease` for availability.
    ///
    /// The same duration bounds the lease of the acquired lock.
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockGuard, LockError>;
}

/// RAII lock handle; releases on drop.
pub struct LockGuard {
    key: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

struct Holder {
    token: u64,
    expires_at: Instant,
}

/// In-process lock table with per-key lease expiry.
pub struct LeaseLockManager {
    table: Arc<DashMap<String, Holder>>,
    next_token: AtomicU64,
    poll_interval: Duration,
}

impl LeaseLockManager {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            next_token: AtomicU64::new(1),
            poll_interval,
        }
    }

    /// Number of currently held (non-expired) keys.
    pub fn held_count(&self) -> usize {
        let now = Instant::now();
        self.table
            .iter()
            .filter(|entry| entry.value().expires_at > now)
            .count()
    }

    fn try_take(&self, key: &str, token: u64, lease: Duration) -> bool {
        let now = Instant::now();
        match self.table.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Holder {
                    token,
                    expires_at: now + lease,
                });
                true
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at <= now {
                    // Lease expired: the previous holder crashed or stalled.
                    warn!(key, "Taking over expired lock lease");
                    occupied.insert(Holder {
                        token,
                        expires_at: now + lease,
                    });
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl Default for LeaseLockManager {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

#[async_trait]
impl LockManager for LeaseLockManager {
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockGuard, LockError> {
        let deadline = Instant::now() + lease;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        loop {
            if self.try_take(key, token, lease) {
                debug!(key, token, "Lock acquired");
                let table = Arc::clone(&self.table);
                let owned_key = key.to_string();
                let release_key = owned_key.clone();
                return Ok(LockGuard {
                    key: owned_key,
                    release: Some(Box::new(move || {
                        // Only remove if we are still the holder; an expired
                        // lease may have been taken over by another worker.
                        table.remove_if(&release_key, |_, holder| holder.token == token);
                    })),
                });
            }

            if Instant::now() >= deadline {
                return Err(LockError::Timeout(key.to_string()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
