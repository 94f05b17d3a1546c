//! Fan-out of independent tasks over a bounded worker pool.
//!
//! Every input item gets exactly one entry in the result map, whether its
//! task completed, panicked or was cancelled. One failing task never affects
//! results of its siblings.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("Task panicked: {0}")]
    Panicked(String),
    #[error("Task was cancelled before completion.")]
    Cancelled,
}

/// Runs one task per item, at most `max_concurrency` at a time.
///
/// There is no ordering among sibling tasks and no batch-wide cancellation:
/// every dispatched task runs to completion.
#[derive(Clone)]
pub struct ParallelBatchRunner {
    permits: Arc<Semaphore>,
}

impl Default for ParallelBatchRunner {
    fn default() -> Self {
        ParallelBatchRunner::new(DEFAULT_CONCURRENCY)
    }
}

impl ParallelBatchRunner {
    /// A limit of zero is treated as one.
    pub fn new(max_concurrency: usize) -> ParallelBatchRunner {
        ParallelBatchRunner {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Executes `worker` for each item and waits for all of them.
    ///
    /// Items with a key that was already seen are skipped, since the map can
    /// hold only one entry per key.
    pub async fn run<T, K, R, KF, W, Fut>(
        &self,
        items: Vec<T>,
        key: KF,
        worker: W,
    ) -> HashMap<K, Result<R, TaskFailure>>
    where
        T: Send + 'static,
        K: Eq + Hash + Clone + Debug + Send + 'static,
        R: Send + 'static,
        KF: Fn(&T) -> K,
        W: Fn(T) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut seen = HashSet::new();
        let mut handles: Vec<(K, JoinHandle<Result<R, TaskFailure>>)> = Vec::with_capacity(items.len());

        for item in items {
            let item_key = key(&item);
            if !seen.insert(item_key.clone()) {
                log::warn!("Duplicate batch item [{:?}] skipped.", item_key);
                continue;
            }

            let permits = self.permits.clone();
            let task = worker(item);
            handles.push((
                item_key,
                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|_| TaskFailure::Cancelled)?;
                    Ok(task.await)
                }),
            ));
        }

        let mut results = HashMap::with_capacity(handles.len());
        for (item_key, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    log::error!("Batch task [{:?}] panicked: {}", item_key, message);
                    Err(TaskFailure::Panicked(message))
                }
                Err(_) => {
                    log::warn!("Batch task [{:?}] was cancelled.", item_key);
                    Err(TaskFailure::Cancelled)
                }
            };
            results.insert(item_key, result);
        }
        results
    }

    /// Same as [`run`](Self::run), but returns immediately with a handle
    /// to the whole batch.
    pub fn spawn<T, K, R, KF, W, Fut>(
        &self,
        items: Vec<T>,
        key: KF,
        worker: W,
    ) -> JoinHandle<HashMap<K, Result<R, TaskFailure>>>
    where
        T: Send + 'static,
        K: Eq + Hash + Clone + Debug + Send + 'static,
        R: Send + 'static,
        KF: Fn(&T) -> K + Send + 'static,
        W: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(items, key, worker).await })
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
