//! Single-flight coordination of origin loads.
//!
//! The first caller to miss on a key starts the load as a [`Shared`] future
//! and registers a weak handle to it. Later callers for the same key upgrade
//! that handle and await the same future, so the origin is called once and
//! every waiter sees the same outcome, success or failure.
//!
//! Whichever waiter is polled drives the load. Dropping one waiter leaves the
//! load running for the others; once every waiter is gone the weak handle no
//! longer upgrades and the next caller starts a fresh load. Dead handles are
//! swept from the table whenever a new load starts, so abandoned keys do not
//! accumulate.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use fieldcache_core::{CacheResult, StoreError};
use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};

type Load<V> = BoxFuture<'static, CacheResult<V>>;

/// Table of loads in flight, keyed by `K`.
pub struct SingleFlight<K, V> {
    flights: Mutex<HashMap<K, WeakShared<Load<V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Await the load for `key`, starting it with `start` if none is running.
    ///
    /// `start` is only called when this caller leads the flight. The table
    /// lock is released before awaiting.
    pub async fn run<F, Fut>(&self, key: K, start: F) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        let flight = self.join_or_start(&key, start)?;
        let outcome = flight.await;
        self.forget_if_finished(&key);
        outcome
    }

    /// Number of loads with at least one live waiter.
    pub fn in_flight(&self) -> CacheResult<usize> {
        let flights = self.flights.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(flights
            .values()
            .filter(|weak| weak.upgrade().is_some())
            .count())
    }

    fn join_or_start<F, Fut>(&self, key: &K, start: F) -> CacheResult<Shared<Load<V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CacheResult<V>> + Send + 'static,
    {
        let mut flights = self.flights.lock().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(running) = flights.get(key).and_then(WeakShared::upgrade) {
            tracing::debug!(?key, "Joining load in flight");
            return Ok(running);
        }

        flights.retain(|_, weak| weak.upgrade().is_some());
        let flight = start().boxed().shared();
        if let Some(weak) = flight.downgrade() {
            flights.insert(key.clone(), weak);
        }
        Ok(flight)
    }

    fn forget_if_finished(&self, key: &K) {
        let Ok(mut flights) = self.flights.lock() else {
            return;
        };
        let finished = flights
            .get(key)
            .is_some_and(|weak| weak.upgrade().is_none());
        if finished {
            flights.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcache_core::{CacheError, OriginError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_sequential_runs_start_fresh_loads() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=2 {
            let calls = Arc::clone(&calls);
            let value = flights
                .run("k", move || async move {
                    Ok(calls.fetch_add(1, Ordering::SeqCst) as u32 + 1)
                })
                .await
                .expect("load should succeed");
            assert_eq!(value, expected);
        }
        assert_eq!(flights.in_flight().expect("in_flight"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_load() {
        let flights: Arc<SingleFlight<&str, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let flights = Arc::clone(&flights);
                let calls = Arc::clone(&calls);
                let gate = Arc::clone(&gate);
                async move {
                    flights
                        .run("k", move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            gate.notified().await;
                            Ok(42)
                        })
                        .await
                }
            })
            .collect();

        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (results, ()) = tokio::join!(futures_util::future::join_all(waiters), release);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.expect("shared load should succeed"), 42);
        }
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let load = || {
            calls.fetch_add(1, Ordering::SeqCst);
            let gate = Arc::clone(&gate);
            async move {
                gate.notified().await;
                Err::<u32, _>(CacheError::Origin(OriginError::msg("origin down")))
            }
        };
        let release = async {
            tokio::task::yield_now().await;
            gate.notify_one();
        };
        let (a, b, ()) = tokio::join!(flights.run("k", load), flights.run("k", load), release);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(a, Err(CacheError::Origin(_))));
        assert!(matches!(b, Err(CacheError::Origin(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_leader_does_not_abort_other_waiters() {
        let flights: Arc<SingleFlight<&str, u32>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let spawn_waiter = || {
            let flights = Arc::clone(&flights);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                flights
                    .run("k", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(7)
                    })
                    .await
            })
        };

        let leader = spawn_waiter();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = spawn_waiter();
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.abort();
        let value = follower
            .await
            .expect("follower task should not panic")
            .expect("load should succeed");

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_load_is_restarted() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        {
            let calls = Arc::clone(&calls);
            let pending = flights.run("k", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
                Ok(1)
            });
            // Poll once so the load starts, then drop its only waiter.
            let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
        }
        assert_eq!(flights.in_flight().expect("in_flight"), 0);

        let value = flights
            .run("k", || async { Ok(2) })
            .await
            .expect("fresh load should succeed");
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    fn table_len<K, V>(flights: &SingleFlight<K, V>) -> usize {
        flights.flights.lock().expect("flight table").len()
    }

    #[tokio::test]
    async fn test_abandoned_loads_are_swept_from_the_table() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();

        for key in ["a", "b", "c", "d", "e"] {
            let pending = flights.run(key, || async {
                std::future::pending::<()>().await;
                Ok(1)
            });
            let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;
            assert!(table_len(&flights) <= 1, "dead handles left behind");
        }

        flights
            .run("k", || async { Ok(2) })
            .await
            .expect("load should succeed");
        assert_eq!(table_len(&flights), 0);
        assert_eq!(flights.in_flight().expect("in_flight"), 0);
    }
}
