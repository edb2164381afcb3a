//! Keyed async mutexes.
//!
//! Two instances are used: one keyed by root repository for whole handshakes,
//! one keyed by working-copy path for a single sync+load or write+push.
//! An entry lives only while some task holds or waits for its key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

type Slots = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

#[derive(Default)]
pub struct KeyedLocks {
    inflight: Slots,
}

/// Exclusive access to one key. Dropping it releases the key and forgets
/// the entry when nobody else is waiting.
pub struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    inflight: Slots,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let lock = {
            let mut inflight = lock_slots(&self.inflight);
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        KeyedGuard {
            guard: Some(lock.lock_owned().await),
            key: key.to_string(),
            inflight: Arc::clone(&self.inflight),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        lock_slots(&self.inflight).len()
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut inflight = lock_slots(&self.inflight);
        let idle = inflight
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            inflight.remove(&self.key);
        }
    }
}

fn lock_slots(slots: &Slots) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = Arc::clone(&locks);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("acme/billing").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("acme/billing").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("acme/ledger")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_forgotten() {
        let locks = KeyedLocks::new();
        for n in 0..100 {
            let _guard = locks.acquire(&format!("acme/ghost-{n}")).await;
        }
        assert_eq!(locks.len(), 0);

        let held = locks.acquire("acme/billing").await;
        assert_eq!(locks.len(), 1);
        drop(held);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_remains() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.acquire("acme/billing").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("acme/billing").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }
}
