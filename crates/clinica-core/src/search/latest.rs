//! Debounced, latest-wins search task.
//!
//! Every submitted query gets a generation number. A query's result is only
//! published if no newer query was submitted in the meantime, so slow responses
//! to stale queries never overwrite fresher ones. Submitting a query also
//! aborts the previous task.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// A published search result.
#[derive(Debug, Clone, PartialEq)]
pub struct Published<T> {
    pub generation: u64,
    pub query: String,
    pub value: T,
}

/// Runs searches so that only the newest query's result is published.
pub struct LatestWins<T> {
    debounce: Duration,
    generation: Arc<AtomicU64>,
    tx: Arc<watch::Sender<Option<Published<T>>>>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl<T> LatestWins<T>
where
    T: Send + Sync + 'static,
{
    /// Create the task runner and a receiver for published results.
    pub fn new(debounce: Duration) -> (Self, watch::Receiver<Option<Published<T>>>) {
        let (tx, rx) = watch::channel(None);
        let runner = Self {
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            tx: Arc::new(tx),
            current: Mutex::new(None),
        };
        (runner, rx)
    }

    /// Another receiver for published results.
    pub fn subscribe(&self) -> watch::Receiver<Option<Published<T>>> {
        self.tx.subscribe()
    }

    /// Generation of the most recently submitted query.
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Submit a query. Must be called from within a Tokio runtime.
    ///
    /// `search` runs after the debounce delay unless a newer query arrives first.
    pub fn submit<F, Fut>(&self, query: impl Into<String>, search: F) -> u64
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let query = query.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.generation);
        let tx = Arc::clone(&self.tx);
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }

            let value = search(query.clone()).await;

            // Checked under the channel lock so a stale result cannot slip in
            let published = tx.send_if_modified(|slot| {
                let newest = latest.load(Ordering::SeqCst) == generation;
                let newer_than_slot = slot.as_ref().map_or(true, |p| p.generation < generation);
                if newest && newer_than_slot {
                    *slot = Some(Published {
                        generation,
                        query,
                        value,
                    });
                    true
                } else {
                    false
                }
            });
            debug!(generation, published, "Search finished");
        });

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.replace(handle) {
            previous.abort();
        }
        generation
    }

    /// Abort the pending search, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = current.take() {
            previous.abort();
        }
    }
}

impl<T> Drop for LatestWins<T> {
    fn drop(&mut self) {
        let current = self.current.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = current.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_debounce_publishes_last_query_only() {
        let (runner, mut rx) = LatestWins::new(Duration::from_millis(300));

        runner.submit("j", |q| async move { q.len() });
        runner.submit("jo", |q| async move { q.len() });
        let last = runner.submit("joao", |q| async move { q.len() });

        rx.changed().await.unwrap();
        let published = rx.borrow().clone().unwrap();
        assert_eq!(published.generation, last);
        assert_eq!(published.query, "joao");
        assert_eq!(published.value, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_response_is_dropped() {
        let (runner, mut rx) = LatestWins::new(Duration::ZERO);

        // Slow first query
        runner.submit("slow", |q| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            q
        });
        tokio::time::sleep(Duration::from_millis(1)).await;

        let fast = runner.submit("fast", |q| async move { q });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().generation, fast);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.borrow().as_ref().unwrap().value, "fast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_result() {
        let (runner, rx) = LatestWins::new(Duration::from_millis(100));
        runner.submit("x", |q| async move { q });
        runner.cancel();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.borrow().is_none());
    }
}
