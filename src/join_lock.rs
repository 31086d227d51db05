//! Per-(PIN, nickname) in-flight join reservations.
//!
//! Two sockets racing to join the same room with the same normalized
//! nickname pass the uniqueness check inside the room entity one after the
//! other only because the room lock serializes them, but the window between
//! nickname validation and room lookup is open. A short-TTL reservation on
//! `(pin, normalized nickname)` closes it: the second joiner fails fast with
//! `JoinInProgress` instead of racing.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::protocol::{GameError, Pin};

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    owner: Uuid,
    acquired_at: DateTime<Utc>,
}

/// Process-wide join reservation map. Entries expire at the configured TTL,
/// so a crashed join path cannot wedge a nickname forever.
#[derive(Clone)]
pub struct JoinLockMap {
    locks: Arc<DashMap<(String, String), LockEntry>>,
    ttl: Duration,
}

impl JoinLockMap {
    pub fn new(ttl: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, entry: &LockEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.acquired_at).num_milliseconds()
            >= self.ttl.as_millis() as i64
    }

    /// Reserve `(pin, nickname)` or fail with `JoinInProgress` if an
    /// unexpired reservation exists. The returned guard releases the
    /// reservation on drop, covering every exit path of the join use-case.
    pub fn acquire(&self, pin: &Pin, normalized_nickname: &str) -> Result<JoinLockGuard, GameError> {
        let key = (pin.as_str().to_string(), normalized_nickname.to_string());
        let now = Utc::now();
        let owner = Uuid::new_v4();

        // The dashmap entry API makes the check-and-insert atomic.
        let mut slot = self.locks.entry(key.clone()).or_insert(LockEntry {
            owner,
            acquired_at: now,
        });
        if slot.owner != owner {
            if self.is_expired(&slot, now) {
                // Stale reservation from an abandoned join; take it over.
                *slot = LockEntry {
                    owner,
                    acquired_at: now,
                };
            } else {
                return Err(GameError::JoinInProgress);
            }
        }
        drop(slot);

        Ok(JoinLockGuard {
            locks: Arc::clone(&self.locks),
            key,
            owner,
        })
    }

    /// Drop every reservation older than the TTL. Called by the reaper.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.locks.len();
        self.locks.retain(|_, entry| !self.is_expired(entry, now));
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Releases the reservation when dropped, unless the entry was taken over
/// after expiry by another joiner.
pub struct JoinLockGuard {
    locks: Arc<DashMap<(String, String), LockEntry>>,
    key: (String, String),
    owner: Uuid,
}

impl Drop for JoinLockGuard {
    fn drop(&mut self) {
        self.locks
            .remove_if(&self.key, |_, entry| entry.owner == self.owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin() -> Pin {
        Pin::parse("123456").unwrap()
    }

    #[test]
    fn second_acquire_conflicts() {
        let locks = JoinLockMap::new(Duration::from_secs(10));
        let _guard = locks.acquire(&pin(), "zoe").unwrap();
        assert!(matches!(
            locks.acquire(&pin(), "zoe"),
            Err(GameError::JoinInProgress)
        ));
    }

    #[test]
    fn different_nicknames_and_pins_do_not_conflict() {
        let locks = JoinLockMap::new(Duration::from_secs(10));
        let _a = locks.acquire(&pin(), "zoe").unwrap();
        let _b = locks.acquire(&pin(), "bob").unwrap();
        let other = Pin::parse("654321").unwrap();
        let _c = locks.acquire(&other, "zoe").unwrap();
        assert_eq!(locks.len(), 3);
    }

    #[test]
    fn guard_drop_releases() {
        let locks = JoinLockMap::new(Duration::from_secs(10));
        {
            let _guard = locks.acquire(&pin(), "zoe").unwrap();
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
        assert!(locks.acquire(&pin(), "zoe").is_ok());
    }

    #[test]
    fn expired_reservation_can_be_taken_over() {
        let locks = JoinLockMap::new(Duration::from_millis(0));
        let stale = locks.acquire(&pin(), "zoe").unwrap();
        // TTL zero: the reservation is immediately stale.
        let fresh = locks.acquire(&pin(), "zoe").unwrap();

        // The stale guard must not release the new owner's reservation.
        drop(stale);
        assert_eq!(locks.len(), 1);
        drop(fresh);
        assert!(locks.is_empty());
    }

    #[test]
    fn sweep_removes_only_expired() {
        let locks = JoinLockMap::new(Duration::from_secs(60));
        let _guard = locks.acquire(&pin(), "zoe").unwrap();
        assert_eq!(locks.sweep(), 0);
        assert_eq!(locks.len(), 1);

        let stale_locks = JoinLockMap::new(Duration::from_millis(0));
        let guard = stale_locks.acquire(&pin(), "zoe").unwrap();
        std::mem::forget(guard);
        assert_eq!(stale_locks.sweep(), 1);
        assert!(stale_locks.is_empty());
    }
}
