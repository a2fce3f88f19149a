//! Fixed-size worker pool over a pre-filled queue.
//!
//! Both the fetch and the apply stages know all of their work up front and
//! no item depends on another. Workers pop from a shared queue until it is
//! empty, sending each outcome into a result or an error channel sized to
//! the number of items, so sends never wait. The coordinator joins every
//! worker before draining either channel.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use labels::SyncError;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;

/// Outcome of draining a queue: successful results and collected errors,
/// each in completion order.
#[derive(Debug)]
pub(crate) struct PoolOutcome<R> {
    pub results: Vec<R>,
    pub errors: Vec<SyncError>,
}

/// Runs `work` over `items` on at most `workers` concurrent tasks.
///
/// Every item is attempted exactly once regardless of other items' failures.
/// A panicking worker is reported as [`SyncError::WorkerPanicked`]; items it
/// had not yet taken are picked up by the remaining workers.
pub(crate) async fn run<T, R, F, Fut>(items: Vec<T>, workers: usize, work: F) -> PoolOutcome<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, SyncError>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return PoolOutcome {
            results: Vec::new(),
            errors: Vec::new(),
        };
    }

    let queue = Arc::new(Mutex::new(VecDeque::from(items)));
    let work = Arc::new(work);
    let (result_tx, mut result_rx) = mpsc::channel(total);
    let (error_tx, mut error_rx) = mpsc::channel(total);

    let mut set = JoinSet::new();
    for worker in 0..workers.clamp(1, total) {
        let queue = Arc::clone(&queue);
        let work = Arc::clone(&work);
        let result_tx = result_tx.clone();
        let error_tx = error_tx.clone();
        set.spawn(async move {
            let mut handled = 0usize;
            loop {
                let next = queue
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .pop_front();
                let Some(item) = next else { break };
                handled += 1;
                // Capacity equals the item count, so neither send can wait;
                // the receivers live until after the join below.
                match work(item).await {
                    Ok(result) => {
                        let _ = result_tx.send(result).await;
                    }
                    Err(err) => {
                        let _ = error_tx.send(err).await;
                    }
                }
            }
            debug!(worker, handled, "worker finished");
        });
    }
    drop(result_tx);
    drop(error_tx);

    let mut errors = Vec::new();
    while let Some(joined) = set.join_next().await {
        if let Err(err) = joined {
            errors.push(SyncError::WorkerPanicked(err.to_string()));
        }
    }

    let mut results = Vec::with_capacity(total);
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }
    while let Some(err) = error_rx.recv().await {
        errors.push(err);
    }
    PoolOutcome { results, errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_item_is_processed_once() {
        let outcome = run((0..100).collect::<Vec<u32>>(), 7, |n| async move {
            Ok::<_, SyncError>(n * 2)
        })
        .await;

        let mut results = outcome.results;
        results.sort_unstable();
        assert_eq!(results, (0..100).map(|n| n * 2).collect::<Vec<_>>());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_other_items() {
        let outcome = run((0..10).collect::<Vec<u32>>(), 3, |n| async move {
            if n % 3 == 0 {
                Err(SyncError::config(format!("item {n}")))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(outcome.results.len(), 6);
        assert_eq!(outcome.errors.len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_pool_size() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        let outcome = run((0..40).collect::<Vec<u32>>(), 4, move |_| {
            let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, SyncError>(())
            }
        })
        .await;

        assert_eq!(outcome.results.len(), 40);
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_empty_queue_spawns_nothing() {
        let outcome = run(Vec::<u32>::new(), 20, |n| async move { Ok::<_, SyncError>(n) }).await;
        assert!(outcome.results.is_empty());
        assert!(outcome.errors.is_empty());
    }
}
