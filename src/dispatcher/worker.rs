//! Worker pool backing asynchronous delivery.
//!
//! A fixed set of OS threads consumes one shared FIFO task queue. Every
//! submitted task returns a [`CompletionHandle`] that carries either the
//! task's return value or the panic it raised. A panicking task never takes
//! its worker down.

use crate::error::panic_message;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for the worker pool
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of worker threads
    pub num_workers: usize,

    /// Worker thread name prefix
    pub name_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            name_prefix: "bus-worker".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads
    pub fn num_workers(mut self, workers: usize) -> Self {
        self.num_workers = workers;
        self
    }

    /// Set the worker thread name prefix
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    /// Check the configuration before any thread is spawned
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::config("worker pool needs at least one worker"));
        }
        Ok(())
    }
}

struct QueueState {
    tasks: VecDeque<Task>,
    running: bool,
    active: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    task_ready: Condvar,
    idle: Condvar,
}

#[derive(Default)]
struct Workers {
    handles: Vec<JoinHandle<()>>,
    ids: Vec<ThreadId>,
    joining: bool,
    joined: bool,
}

/// A pool of OS threads executing submitted closures.
pub struct WorkerPool {
    config: WorkerConfig,
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
    workers_joined: Condvar,
}

impl WorkerPool {
    /// Create a pool and start its workers.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] for zero workers, [`Error::Internal`]
    /// when the OS refuses to spawn a thread.
    pub fn new(config: WorkerConfig) -> Result<Self> {
        config.validate()?;

        info!(
            workers = config.num_workers,
            prefix = %config.name_prefix,
            "Starting worker pool"
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                running: true,
                active: 0,
            }),
            task_ready: Condvar::new(),
            idle: Condvar::new(),
        });

        let pool = Self {
            config,
            shared,
            workers: Mutex::new(Workers::default()),
            workers_joined: Condvar::new(),
        };

        for i in 0..pool.config.num_workers {
            let shared = Arc::clone(&pool.shared);
            let worker_name = format!("{}-{}", pool.config.name_prefix, i);

            let spawned = thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || worker_loop(&shared, &worker_name));

            match spawned {
                Ok(handle) => {
                    let mut workers = pool.workers.lock();
                    workers.ids.push(handle.thread().id());
                    workers.handles.push(handle);
                }
                Err(e) => {
                    // Dropping the partial pool joins the workers already started.
                    return Err(Error::internal(format!(
                        "failed to spawn worker {i}: {e}"
                    )));
                }
            }
        }

        Ok(pool)
    }

    /// Queue a closure for execution on a worker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolShutDown`] once [`shutdown`](Self::shutdown) has
    /// begun.
    pub fn submit<F, R>(&self, f: F) -> Result<CompletionHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let task: Task = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| Error::TaskPanicked(panic_message(payload.as_ref())));
            // The handle may already be gone; the result is simply dropped then.
            let _ = tx.send(outcome);
        });

        {
            let mut state = self.shared.state.lock();
            if !state.running {
                return Err(Error::PoolShutDown);
            }
            state.tasks.push_back(task);
            trace!(queued = state.tasks.len(), "Task submitted");
        }

        self.shared.task_ready.notify_one();
        Ok(CompletionHandle { receiver: rx })
    }

    /// Block until the queue is empty and no task is executing.
    ///
    /// Must not be called from one of this pool's own workers.
    pub fn wait_idle(&self) {
        let mut state = self.shared.state.lock();
        while !state.tasks.is_empty() || state.active > 0 {
            self.shared.idle.wait(&mut state);
        }
    }

    /// Stop accepting tasks, run everything already queued, then join the
    /// workers.
    ///
    /// Concurrent and repeated calls return only once the workers were
    /// joined. When called from one of the pool's own workers, that worker
    /// is detached instead of joined and the call does not wait for another
    /// caller's join.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.running {
                info!(prefix = %self.config.name_prefix, "Stopping worker pool");
                state.running = false;
            }
        }
        self.shared.task_ready.notify_all();

        let current = thread::current().id();
        let handles = {
            let mut workers = self.workers.lock();
            if workers.joining {
                if !workers.ids.contains(&current) {
                    while !workers.joined {
                        self.workers_joined.wait(&mut workers);
                    }
                }
                return;
            }
            workers.joining = true;
            std::mem::take(&mut workers.handles)
        };

        for handle in handles {
            if handle.thread().id() == current {
                debug!("Worker pool shut down from its own worker, detaching it");
                continue;
            }
            if handle.join().is_err() {
                error!(prefix = %self.config.name_prefix, "Worker thread panicked");
            }
        }

        self.workers.lock().joined = true;
        self.workers_joined.notify_all();
        info!(prefix = %self.config.name_prefix, "Worker pool stopped");
    }

    /// Whether the calling thread is one of this pool's workers
    pub fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.workers.lock().ids.contains(&current)
    }

    /// Number of worker threads the pool was started with
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Number of tasks waiting for a worker
    pub fn queued(&self) -> usize {
        self.shared.state.lock().tasks.len()
    }

    /// Whether shutdown has begun
    pub fn is_shut_down(&self) -> bool {
        !self.shared.state.lock().running
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("queued", &self.queued())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn worker_loop(shared: &Shared, worker_name: &str) {
    debug!(worker = worker_name, "Worker started");

    loop {
        let task = {
            let mut state = shared.state.lock();
            while state.running && state.tasks.is_empty() {
                shared.task_ready.wait(&mut state);
            }
            match state.tasks.pop_front() {
                Some(task) => {
                    state.active += 1;
                    task
                }
                None => break,
            }
        };

        task();

        let mut state = shared.state.lock();
        state.active -= 1;
        if state.active == 0 && state.tasks.is_empty() {
            shared.idle.notify_all();
        }
    }

    debug!(worker = worker_name, "Worker stopped");
}

/// Handle to the outcome of a task submitted to a [`WorkerPool`].
///
/// Join it from a plain thread, or `.await` it from async code.
pub struct CompletionHandle<R> {
    receiver: oneshot::Receiver<Result<R>>,
}

impl<R> CompletionHandle<R> {
    /// Block the current thread until the task finishes.
    ///
    /// # Errors
    ///
    /// [`Error::TaskPanicked`] when the task panicked, [`Error::Internal`]
    /// when the task was dropped without running.
    ///
    /// # Panics
    ///
    /// Panics when called from inside an asynchronous execution context;
    /// `.await` the handle there instead.
    pub fn join(self) -> Result<R> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(abandoned()))
    }

    /// Return the outcome if the task has already finished.
    pub fn try_join(&mut self) -> Option<Result<R>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(abandoned())),
        }
    }
}

impl<R> Future for CompletionHandle<R> {
    type Output = Result<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(abandoned())))
    }
}

impl<R> fmt::Debug for CompletionHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle").finish_non_exhaustive()
    }
}

fn abandoned() -> Error {
    Error::internal("task dropped before completion")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(
            WorkerConfig::new()
                .num_workers(workers)
                .name_prefix("test-worker"),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = WorkerPool::new(WorkerConfig::new().num_workers(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_execute_tasks() {
        let pool = pool(4);

        let handles: Vec<_> = (0..10)
            .map(|i| pool.submit(move || i * i).unwrap())
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), i * i);
        }
    }

    #[test]
    fn test_single_worker_runs_in_submission_order() {
        let pool = pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..50)
            .map(|expected| {
                let counter = Arc::clone(&counter);
                pool.submit(move || counter.fetch_add(1, Ordering::SeqCst) == expected)
                    .unwrap()
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_panic_is_captured() {
        let pool = pool(1);

        let failing = pool.submit(|| -> u32 { panic!("Test exception") }).unwrap();
        let err = failing.join().unwrap_err();
        assert_eq!(err, Error::TaskPanicked("Test exception".to_string()));

        // The worker survived the panic.
        let ok = pool.submit(|| 7).unwrap();
        assert_eq!(ok.join().unwrap(), 7);
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = pool(2);
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert_eq!(pool.submit(|| ()).unwrap_err(), Error::PoolShutDown);

        // Idempotent.
        pool.shutdown();
    }

    #[test]
    fn test_shutdown_drains_queued_tasks() {
        let pool = pool(1);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(2));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_wait_idle() {
        let pool = pool(4);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.wait_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_try_join() {
        let pool = pool(1);
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let mut handle = pool
            .submit(move || {
                release_rx.recv().ok();
                "done"
            })
            .unwrap();
        assert!(handle.try_join().is_none());

        release_tx.send(()).unwrap();
        pool.wait_idle();
        assert_eq!(handle.try_join().unwrap().unwrap(), "done");
    }

    #[test]
    fn test_concurrent_shutdown_waits_for_join() {
        let pool = Arc::new(pool(1));
        let finished = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&finished);
        pool.submit(move || {
            thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        let first = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.shutdown())
        };
        thread::sleep(Duration::from_millis(20));
        pool.shutdown();

        assert!(finished.load(Ordering::SeqCst));
        first.join().unwrap();
    }

    #[test]
    fn test_is_worker_thread() {
        let other = pool(1);
        let workers = Arc::new(pool(2));
        assert!(!workers.is_worker_thread());

        let inner = Arc::clone(&workers);
        let on_worker = workers.submit(move || inner.is_worker_thread()).unwrap();
        assert!(on_worker.join().unwrap());

        let inner = Arc::clone(&workers);
        let on_other = other.submit(move || inner.is_worker_thread()).unwrap();
        assert!(!on_other.join().unwrap());
    }

    #[tokio::test]
    async fn test_await_handle() {
        let pool = pool(2);
        let handle = pool.submit(|| String::from("from a worker")).unwrap();
        assert_eq!(handle.await.unwrap(), "from a worker");
    }
}
