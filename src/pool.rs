//! Bounded worker pool for evaluation tasks.
//!
//! Work runs as tokio tasks gated by a semaphore, so at most `capacity`
//! units execute at once. Tasks are never joined on shutdown: dropping the
//! runtime drops them, and nothing in the pool keeps the process alive.

use crate::error::{PoolError, TaskError};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

/// Sizing options for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Worker slots per available CPU.
    pub threads_per_core: usize,
    /// Hard upper bound on slots, if any.
    pub max_workers: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            threads_per_core: 2,
            max_workers: None,
        }
    }
}

impl PoolOptions {
    /// Number of slots these options give on this host. Never zero.
    pub fn capacity(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let wanted = cores.saturating_mul(self.threads_per_core);
        let capped = match self.max_workers {
            Some(max) => wanted.min(max),
            None => wanted,
        };
        capped.max(1)
    }
}

/// Outcome of one bounded wait on a [`TaskHandle`].
#[derive(Debug)]
pub enum Wait<T> {
    /// The task finished successfully.
    Ready(T),
    /// The wait slice elapsed first; the task is still running.
    Interrupted,
}

/// Handle to a unit of work submitted to the pool.
#[derive(Debug)]
pub struct TaskHandle<T> {
    inner: JoinHandle<Result<T, TaskError>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task, at most `slice` if given.
    ///
    /// `Wait::Interrupted` is retryable: call `wait` again on the same
    /// handle. Errors are terminal and carry the task's failure.
    pub async fn wait(&mut self, slice: Option<Duration>) -> Result<Wait<T>, TaskError> {
        let joined = match slice {
            Some(slice) => match tokio::time::timeout(slice, &mut self.inner).await {
                Ok(joined) => joined,
                Err(_) => return Ok(Wait::Interrupted),
            },
            None => (&mut self.inner).await,
        };

        match joined {
            Ok(outcome) => outcome.map(Wait::Ready),
            Err(e) => Err(join_failure(e)),
        }
    }
}

fn join_failure(err: JoinError) -> TaskError {
    if !err.is_panic() {
        return TaskError::Cancelled;
    }

    let payload = err.into_panic();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    TaskError::Panicked(message)
}

/// Fixed-capacity pool, shared across evaluation rounds.
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    runtime: Handle,
    submitted: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool sized from `options` on the current tokio runtime.
    pub fn new(options: &PoolOptions) -> Result<Self, PoolError> {
        Self::with_capacity(options.capacity())
    }

    /// Create a pool with an explicit number of slots (at least one).
    pub fn with_capacity(capacity: usize) -> Result<Self, PoolError> {
        let runtime = Handle::try_current().map_err(|e| PoolError::NoRuntime(e.to_string()))?;
        let capacity = capacity.max(1);
        debug!("Worker pool created with {} slots", capacity);

        Ok(Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            runtime,
            submitted: AtomicUsize::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by running work.
    pub fn idle_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Units of work accepted since the pool was created.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.permits.is_closed()
    }

    /// Submit a unit of work. It starts once a slot is free.
    pub fn submit<F, T>(&self, work: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        if self.permits.is_closed() {
            return Err(PoolError::ShutDown);
        }

        let permits = Arc::clone(&self.permits);
        let inner = self.runtime.spawn(async move {
            let _slot = permits
                .acquire_owned()
                .await
                .map_err(|_| TaskError::PoolShutDown)?;
            work.await
        });

        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(TaskHandle { inner })
    }

    /// Stop accepting work. Queued work fails with `TaskError::PoolShutDown`;
    /// running work is left to finish.
    pub fn shutdown(&self) {
        if !self.permits.is_closed() {
            debug!("Shutting down worker pool ({} submitted)", self.submitted());
            self.permits.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_default_capacity_is_twice_the_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(PoolOptions::default().capacity(), cores * 2);
    }

    #[test]
    fn test_capacity_respects_cap_and_floor() {
        let capped = PoolOptions {
            threads_per_core: 8,
            max_workers: Some(3),
        };
        assert_eq!(capped.capacity(), 3);

        let zero = PoolOptions {
            threads_per_core: 0,
            max_workers: None,
        };
        assert_eq!(zero.capacity(), 1);
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        assert!(matches!(
            WorkerPool::with_capacity(2),
            Err(PoolError::NoRuntime(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency() {
        let pool = WorkerPool::with_capacity(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..10usize {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(
                pool.submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, TaskError>(i)
                })
                .unwrap(),
            );
        }

        let mut outputs = Vec::new();
        for mut handle in handles {
            match handle.wait(None).await.unwrap() {
                Wait::Ready(i) => outputs.push(i),
                Wait::Interrupted => panic!("unbounded wait cannot be interrupted"),
            }
        }

        assert_eq!(outputs, (0..10).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.submitted(), 10);
        assert_eq!(pool.idle_slots(), 2);
    }

    #[tokio::test]
    async fn test_wait_slice_interrupts_then_resumes() {
        let pool = WorkerPool::with_capacity(1).unwrap();
        let mut handle = pool
            .submit(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, TaskError>("done")
            })
            .unwrap();

        let first = assert_ok!(handle.wait(Some(Duration::from_millis(5))).await);
        assert!(matches!(first, Wait::Interrupted));

        let second = assert_ok!(handle.wait(None).await);
        assert!(matches!(second, Wait::Ready("done")));
    }

    #[tokio::test]
    async fn test_failure_is_delivered_to_handle() {
        let pool = WorkerPool::with_capacity(2).unwrap();
        let mut failing = pool
            .submit::<_, ()>(async { Err(TaskError::LengthMismatch { expected: 3, actual: 1 }) })
            .unwrap();
        let mut sibling = pool.submit(async { Ok::<_, TaskError>(5) }).unwrap();

        let err = assert_err!(failing.wait(None).await);
        assert!(matches!(err, TaskError::LengthMismatch { expected: 3, actual: 1 }));
        assert!(matches!(sibling.wait(None).await, Ok(Wait::Ready(5))));
    }

    #[tokio::test]
    async fn test_panic_is_captured() {
        let pool = WorkerPool::with_capacity(2).unwrap();
        let explode = true;
        let mut handle = pool
            .submit(async move {
                if explode {
                    panic!("interpreter exploded");
                }
                Ok::<_, TaskError>(())
            })
            .unwrap();

        match handle.wait(None).await {
            Err(TaskError::Panicked(message)) => assert!(message.contains("exploded")),
            other => panic!("expected panic failure, got {:?}", other),
        }

        let mut after = pool.submit(async { Ok::<_, TaskError>(1) }).unwrap();
        assert!(matches!(after.wait(None).await, Ok(Wait::Ready(1))));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_and_fails_queued_work() {
        let pool = WorkerPool::with_capacity(1).unwrap();
        let mut running = pool
            .submit(async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, TaskError>(1)
            })
            .unwrap();
        // let the first task take the only slot
        tokio::task::yield_now().await;

        let mut queued = pool.submit(async { Ok::<_, TaskError>(2) }).unwrap();
        pool.shutdown();

        assert!(pool.is_shut_down());
        assert!(matches!(
            pool.submit(async { Ok::<_, TaskError>(3) }),
            Err(PoolError::ShutDown)
        ));
        assert!(matches!(
            queued.wait(None).await,
            Err(TaskError::PoolShutDown)
        ));
        assert!(matches!(running.wait(None).await, Ok(Wait::Ready(1))));
    }
}
