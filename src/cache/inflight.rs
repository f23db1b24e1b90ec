//! Single-flight coordination for cache misses
//!
//! Concurrent requests for the same (owner, fingerprint) pair must not
//! each run the generation chain. The first caller claims the key and
//! holds a guard; later callers receive a wait handle tied to the
//! active flight. The guard wakes all waiters on drop, so the key is
//! released even if the generating task panics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use uuid::Uuid;

type Key = (Uuid, String);

/// Outcome of trying to claim a generation flight.
pub(crate) enum Flight {
    /// This caller generates. Dropping the guard releases the key.
    Begun(FlightGuard),
    /// Another caller is generating; wait, then re-read the store.
    Wait(WaitHandle),
}

/// Registry of keys with a generation currently in flight.
#[derive(Default)]
pub(crate) struct InFlightKeys {
    inner: Mutex<HashMap<Key, Arc<Notify>>>,
}

impl InFlightKeys {
    pub(crate) fn claim(self: &Arc<Self>, owner: Uuid, fingerprint: &str) -> Flight {
        let key = (owner, fingerprint.to_string());
        let mut map = self.lock();
        if let Some(notify) = map.get(&key).cloned() {
            return Flight::Wait(WaitHandle {
                registry: self.clone(),
                key,
                notify,
            });
        }
        let notify = Arc::new(Notify::new());
        map.insert(key.clone(), notify.clone());
        Flight::Begun(FlightGuard {
            registry: self.clone(),
            key,
            notify,
        })
    }

    fn is_active(&self, key: &Key) -> bool {
        self.lock().contains_key(key)
    }

    // A panicked flight poisons nothing worth keeping: the map is
    // consistent after every operation, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Arc<Notify>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by the caller that owns the in-flight generation.
pub(crate) struct FlightGuard {
    registry: Arc<InFlightKeys>,
    key: Key,
    notify: Arc<Notify>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
        self.notify.notify_waiters();
    }
}

/// Ticket for waiting out someone else's flight on the same key.
pub(crate) struct WaitHandle {
    registry: Arc<InFlightKeys>,
    key: Key,
    notify: Arc<Notify>,
}

impl WaitHandle {
    /// Wait until the flight this handle was issued against has
    /// finished. Registration happens before the key is re-checked, so
    /// a flight that ends between `claim` and this call cannot leave
    /// the waiter sleeping on a notification that already fired.
    pub(crate) async fn wait(self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        let already_notified = notified.as_mut().enable();
        if !already_notified && self.registry.is_active(&self.key) {
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn owner() -> Uuid {
        Uuid::new_v4()
    }

    #[tokio::test]
    async fn second_claim_on_the_same_key_waits() {
        let registry = Arc::new(InFlightKeys::default());
        let me = owner();

        let first = registry.claim(me, "fp");
        assert!(matches!(first, Flight::Begun(_)));

        let second = registry.claim(me, "fp");
        assert!(matches!(second, Flight::Wait(_)));
    }

    #[tokio::test]
    async fn distinct_owners_do_not_contend() {
        let registry = Arc::new(InFlightKeys::default());

        let first = registry.claim(owner(), "fp");
        let second = registry.claim(owner(), "fp");
        assert!(matches!(first, Flight::Begun(_)));
        assert!(matches!(second, Flight::Begun(_)));
    }

    #[tokio::test]
    async fn dropping_the_guard_wakes_waiters() {
        let registry = Arc::new(InFlightKeys::default());
        let me = owner();

        let Flight::Begun(guard) = registry.claim(me, "fp") else {
            panic!("expected to begin the flight");
        };
        let Flight::Wait(handle) = registry.claim(me, "fp") else {
            panic!("expected to wait");
        };

        let waiter = tokio::spawn(handle.wait());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn waiting_after_the_flight_ended_returns_immediately() {
        let registry = Arc::new(InFlightKeys::default());
        let me = owner();

        let Flight::Begun(guard) = registry.claim(me, "fp") else {
            panic!("expected to begin the flight");
        };
        let Flight::Wait(handle) = registry.claim(me, "fp") else {
            panic!("expected to wait");
        };

        drop(guard);
        tokio::time::timeout(Duration::from_millis(100), handle.wait())
            .await
            .expect("stale wait must not block");
    }
}
