//! Single-flight de-duplication for expensive scans.
//!
//! Concurrent calls for the same key collapse into one underlying
//! operation; every caller observes the same outcome. The map entry is
//! inserted before the operation starts and removed by a drop guard once it
//! settles (completion, failure, or abandonment), so the next call always
//! triggers a fresh run and nothing leaks.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

type InflightMap<T> = Mutex<HashMap<String, Shared<BoxFuture<'static, T>>>>;

/// Collapses concurrent operations sharing a key into a single run.
pub struct SingleFlight<T: Clone> {
    inflight: Arc<InflightMap<T>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of operations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }

    /// Run `operation` under `key`, or join the run already in flight.
    pub async fn run<F>(&self, key: &str, operation: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(key) {
                Some(existing) => existing.clone(),
                None => {
                    let guard = ClearOnSettle {
                        inflight: Arc::clone(&self.inflight),
                        key: key.to_string(),
                    };
                    let task = async move {
                        let _guard = guard;
                        operation.await
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key.to_string(), task.clone());
                    task
                }
            }
        };

        shared.await
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the lock entry when the wrapped operation settles.
struct ClearOnSettle<T> {
    inflight: Arc<InflightMap<T>>,
    key: String,
}

impl<T> Drop for ClearOnSettle<T> {
    fn drop(&mut self) {
        self.inflight.lock().unwrap().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[tokio::test]
    async fn concurrent_calls_share_one_run() {
        let flight = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..3 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                flight
                    .run("", async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        42usize
                    })
                    .await
            }));
        }

        // Let every caller reach the in-flight entry before releasing it.
        tokio::task::yield_now().await;
        release.notify_waiters();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let flight = SingleFlight::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for key in ["192.168.1.10", "192.168.1.0/24"] {
            let runs = Arc::clone(&runs);
            flight
                .run(key, async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn entry_is_cleared_after_failure() {
        let flight: SingleFlight<Result<(), String>> = SingleFlight::new();

        let outcome = flight.run("", async { Err("boom".to_string()) }).await;
        assert!(outcome.is_err());
        assert_eq!(flight.in_flight(), 0);

        // A later call runs again rather than observing the stale failure.
        let outcome = flight.run("", async { Ok(()) }).await;
        assert!(outcome.is_ok());
    }
}
