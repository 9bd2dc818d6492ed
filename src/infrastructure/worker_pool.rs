//! Fixed-size async worker pool with a blocking push
//!
//! Workers draw boxed tasks from one shared channel of capacity 1. When
//! every worker is busy and the slot is taken, [`WorkerPool::push`] waits:
//! that is the only backpressure between the scan loop and the workers.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::domain::errors::{TrackerError, TrackerResult};
use crate::infrastructure::config::defaults;

pub const DEFAULT_WORKER_COUNT: usize = defaults::WORKER_COUNT;

type Task = Box<dyn FnOnce() -> BoxFuture<'static, TrackerResult<()>> + Send>;

/// Counters for finished tasks.
#[derive(Debug, Default)]
pub struct PoolStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl PoolStats {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

pub struct WorkerPool {
    sender: Option<mpsc::Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    cancellation: CancellationToken,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Spawn `count` workers (at least one) on the current runtime.
    pub fn new(count: usize, cancellation: CancellationToken) -> Self {
        let count = count.max(1);
        let (sender, receiver) = mpsc::channel::<Task>(1);
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&receiver),
                    cancellation.clone(),
                    Arc::clone(&stats),
                ))
            })
            .collect();

        debug!(workers = count, "Worker pool started");

        Self {
            sender: Some(sender),
            workers,
            cancellation,
            stats,
        }
    }

    /// Queue a task, waiting while all workers are busy.
    pub async fn push<F, Fut>(&self, task: F) -> TrackerResult<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = TrackerResult<()>> + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(TrackerError::PoolClosed)?;
        let task: Task = Box::new(move || task().boxed());

        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(TrackerError::Cancelled),
            sent = sender.send(task) => sent.map_err(|_| TrackerError::PoolClosed),
        }
    }

    /// Close the queue and wait for every worker to finish.
    pub async fn stop_wait(&mut self) {
        // Dropping the sender lets workers drain the queue and exit.
        self.sender.take();

        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                error!("Worker task terminated abnormally: {e}");
            }
        }
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Task>>>,
    cancellation: CancellationToken,
    stats: Arc<PoolStats>,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    warn!(worker_id, "Cancellation requested, worker stopped");
                    return;
                }
                task = receiver.recv() => task,
            }
        };

        let Some(task) = next else {
            debug!(worker_id, "Queue closed, worker exiting");
            return;
        };

        match AssertUnwindSafe(async move { task().await }).catch_unwind().await {
            Ok(Ok(())) => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, "Worker task failed: {e}");
            }
            Err(panic) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!(worker_id, "Worker task panicked: {}", panic_message(panic.as_ref()));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ParseError;
    use crate::domain::vendor::VendorType;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn runs_every_pushed_task() {
        let mut pool = WorkerPool::new(3, CancellationToken::new());
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.push(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        pool.stop_wait().await;

        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.stats().completed(), 10);
        assert_eq!(pool.stats().failed(), 0);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_worker_count() {
        let mut pool = WorkerPool::new(2, CancellationToken::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.push(move || async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        pool.stop_wait().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.stats().completed(), 8);
    }

    #[tokio::test]
    async fn push_blocks_while_saturated() {
        let mut pool = WorkerPool::new(1, CancellationToken::new());
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        pool.push(move || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(())
        })
        .await
        .unwrap();
        started_rx.await.unwrap();

        // Fills the single queue slot.
        pool.push(|| async { Ok(()) }).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            pool.push(|| async { Ok(()) }),
        )
        .await;
        assert!(blocked.is_err(), "push should wait for a free worker");

        release_tx.send(()).unwrap();
        pool.push(|| async { Ok(()) }).await.unwrap();
        pool.stop_wait().await;

        assert_eq!(pool.stats().completed(), 3);
    }

    #[tokio::test]
    async fn failing_task_does_not_stop_worker() {
        let mut pool = WorkerPool::new(1, CancellationToken::new());

        pool.push(|| async {
            Err(ParseError::extraction(VendorType::Lamoda, "broken").into())
        })
        .await
        .unwrap();
        pool.push(|| async { Ok(()) }).await.unwrap();
        pool.stop_wait().await;

        assert_eq!(pool.stats().failed(), 1);
        assert_eq!(pool.stats().completed(), 1);
    }

    #[tokio::test]
    async fn panicking_task_counts_as_failure() {
        let mut pool = WorkerPool::new(1, CancellationToken::new());

        pool.push(|| async {
            let broken = true;
            if broken {
                panic!("parser blew up");
            }
            Ok(())
        })
        .await
        .unwrap();
        pool.push(|| async { Ok(()) }).await.unwrap();
        pool.push(|| async { Ok(()) }).await.unwrap();
        pool.stop_wait().await;

        assert_eq!(pool.stats().failed(), 1);
        assert_eq!(pool.stats().completed(), 2);
    }

    #[tokio::test]
    async fn cancelled_pool_rejects_pushes() {
        let token = CancellationToken::new();
        let mut pool = WorkerPool::new(2, token.clone());
        token.cancel();

        let result = pool.push(|| async { Ok(()) }).await;
        pool.stop_wait().await;

        assert_eq!(result, Err(TrackerError::Cancelled));
    }

    #[tokio::test]
    async fn push_after_stop_is_rejected() {
        let mut pool = WorkerPool::new(1, CancellationToken::new());
        pool.stop_wait().await;
        pool.stop_wait().await;

        let result = pool.push(|| async { Ok(()) }).await;
        assert_eq!(result, Err(TrackerError::PoolClosed));
    }
}
