//! Distributed mutual exclusion over a string key.
//!
//! Checkpoint advancement is the only cross-process critical section in the
//! core; callers back this port with their coordination service. The
//! in-process implementation here is the reference adapter for
//! single-process deployments and tests.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::ports::clock::Clock;

/// Proof of lock ownership. The fencing token increases monotonically per
/// key so stale holders can be detected downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    pub key: String,
    pub fencing_token: u64,
}

#[derive(Debug)]
pub enum LockAcquisition {
    Acquired(LockHandle),
    Contended,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock; returns `Contended` without waiting if it is
    /// held and unexpired.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> anyhow::Result<LockAcquisition>;

    /// Release a held lock. Releasing with a stale fencing token is a no-op.
    async fn release(&self, handle: LockHandle) -> anyhow::Result<()>;
}

struct HeldLock {
    fencing_token: u64,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// Single-process lock with TTL expiry and fencing tokens.
pub struct InProcessLock {
    clock: Arc<dyn Clock>,
    held: Mutex<HashMap<String, HeldLock>>,
    token_counter: AtomicU64,
}

impl InProcessLock {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            held: Mutex::new(HashMap::new()),
            token_counter: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl DistributedLock for InProcessLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> anyhow::Result<LockAcquisition> {
        let now = self.clock.now();
        let mut held = self.held.lock().expect("lock table poisoned");

        if let Some(existing) = held.get(key) {
            if existing.expires_at > now {
                return Ok(LockAcquisition::Contended);
            }
            tracing::warn!(key, "lock TTL expired; reclaiming");
        }

        let fencing_token = self.token_counter.fetch_add(1, Ordering::SeqCst);
        held.insert(
            key.to_string(),
            HeldLock {
                fencing_token,
                expires_at: now + ttl,
            },
        );
        Ok(LockAcquisition::Acquired(LockHandle {
            key: key.to_string(),
            fencing_token,
        }))
    }

    async fn release(&self, handle: LockHandle) -> anyhow::Result<()> {
        let mut held = self.held.lock().expect("lock table poisoned");
        if let Some(existing) = held.get(&handle.key) {
            if existing.fencing_token == handle.fencing_token {
                held.remove(&handle.key);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::FixedClock;
    use chrono::{TimeZone, Utc};

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_acquire_then_contended() {
        let lock = InProcessLock::new(fixed_clock());
        let first = lock.try_acquire("schedule:a", Duration::seconds(60)).await.unwrap();
        assert!(matches!(first, LockAcquisition::Acquired(_)));

        let second = lock.try_acquire("schedule:a", Duration::seconds(60)).await.unwrap();
        assert!(matches!(second, LockAcquisition::Contended));
    }

    #[tokio::test]
    async fn test_release_frees_key() {
        let lock = InProcessLock::new(fixed_clock());
        let handle = match lock.try_acquire("k", Duration::seconds(60)).await.unwrap() {
            LockAcquisition::Acquired(h) => h,
            LockAcquisition::Contended => panic!("expected acquisition"),
        };
        lock.release(handle).await.unwrap();

        let again = lock.try_acquire("k", Duration::seconds(60)).await.unwrap();
        assert!(matches!(again, LockAcquisition::Acquired(_)));
    }

    #[tokio::test]
    async fn test_ttl_expiry_allows_reclaim() {
        let clock = fixed_clock();
        let lock = InProcessLock::new(clock.clone());
        let _held = lock.try_acquire("k", Duration::seconds(60)).await.unwrap();

        clock.advance(chrono::Duration::seconds(61));
        let reclaimed = lock.try_acquire("k", Duration::seconds(60)).await.unwrap();
        assert!(matches!(reclaimed, LockAcquisition::Acquired(_)));
    }

    #[tokio::test]
    async fn test_fencing_tokens_increase() {
        let lock = InProcessLock::new(fixed_clock());
        let first = match lock.try_acquire("k", Duration::seconds(1)).await.unwrap() {
            LockAcquisition::Acquired(h) => h,
            LockAcquisition::Contended => panic!("expected acquisition"),
        };
        lock.release(first.clone()).await.unwrap();
        let second = match lock.try_acquire("k", Duration::seconds(1)).await.unwrap() {
            LockAcquisition::Acquired(h) => h,
            LockAcquisition::Contended => panic!("expected acquisition"),
        };
        assert!(second.fencing_token > first.fencing_token);
    }

    #[tokio::test]
    async fn test_stale_release_is_noop() {
        let clock = fixed_clock();
        let lock = InProcessLock::new(clock.clone());
        let stale = match lock.try_acquire("k", Duration::seconds(1)).await.unwrap() {
            LockAcquisition::Acquired(h) => h,
            LockAcquisition::Contended => panic!("expected acquisition"),
        };

        clock.advance(chrono::Duration::seconds(2));
        let fresh = match lock.try_acquire("k", Duration::seconds(60)).await.unwrap() {
            LockAcquisition::Acquired(h) => h,
            LockAcquisition::Contended => panic!("expected acquisition"),
        };

        // Releasing with the stale token must not free the fresh holder.
        lock.release(stale).await.unwrap();
        let contended = lock.try_acquire("k", Duration::seconds(60)).await.unwrap();
        assert!(matches!(contended, LockAcquisition::Contended));

        lock.release(fresh).await.unwrap();
    }
}
