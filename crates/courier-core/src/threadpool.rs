//! Bounded thread pool for background request execution.
//!
//! The pool grows on demand between a minimum and a maximum number of worker
//! threads, buffers work in a bounded queue, and retires workers that stay
//! idle longer than the keep-alive interval. When every worker is busy and
//! the queue is full, submission fails with [`ExecuteError::Saturated`]
//! instead of blocking or growing without bound.
//!
//! # Example
//!
//! ```no_run
//! use courier_core::threadpool::{Executor, ThreadPool, ThreadPoolConfig};
//!
//! let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2, 4)).unwrap();
//!
//! pool.execute(Box::new(|| {
//!     // Blocking network work...
//! }))
//! .unwrap_or_else(|rejected| eprintln!("{rejected}"));
//! ```
//!
//! # Lazy Construction
//!
//! ```no_run
//! use courier_core::threadpool::{Executor, LazyThreadPool};
//!
//! // No threads and no queue exist until the first job arrives.
//! let pool = LazyThreadPool::default();
//! assert!(!pool.is_initialized());
//!
//! let _ = pool.execute(Box::new(|| println!("hello from a worker")));
//! assert!(pool.is_initialized());
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;

use crate::error::{ExecuteError, Result, ThreadPoolError};
use crate::logging::{span_names, targets};

/// Idle time after which a worker thread exits.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Capacity of the pending-job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that eventually runs jobs.
///
/// Implemented by [`ThreadPool`], [`LazyThreadPool`], and by any plain
/// `Fn(Job)` closure. A closure can forward jobs to another context (an
/// event loop, a UI thread) or simply run them in place:
///
/// ```
/// use courier_core::threadpool::{Executor, Job};
///
/// let inline = |job: Job| job();
/// inline.execute(Box::new(|| println!("ran inline"))).unwrap();
/// ```
pub trait Executor: Send + Sync {
    /// Schedule `job` to run. A rejected job is returned inside the error.
    fn execute(&self, job: Job) -> std::result::Result<(), ExecuteError>;
}

impl<F> Executor for F
where
    F: Fn(Job) + Send + Sync,
{
    fn execute(&self, job: Job) -> std::result::Result<(), ExecuteError> {
        self(job);
        Ok(())
    }
}

/// Configuration for creating a thread pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadPoolConfig {
    /// Workers started before jobs are queued instead of spawning threads.
    pub min_threads: usize,
    /// Upper bound on concurrently running workers.
    pub max_threads: usize,
    /// Idle time after which any worker, including the minimum, exits.
    pub keep_alive: Duration,
    /// Capacity of the pending-job queue.
    pub queue_capacity: usize,
    /// Name prefix for worker threads.
    pub thread_name: String,
    /// Stack size for worker threads in bytes.
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::for_parallelism(parallelism)
    }
}

impl ThreadPoolConfig {
    /// Derive the default sizing from a given degree of parallelism.
    ///
    /// `min_threads` is `parallelism - 1` clamped to `2..=4`, `max_threads`
    /// is `parallelism * 2 + 1`.
    pub fn for_parallelism(parallelism: usize) -> Self {
        let parallelism = parallelism.max(1);
        Self {
            min_threads: (parallelism - 1).clamp(2, 4),
            max_threads: parallelism * 2 + 1,
            keep_alive: DEFAULT_KEEP_ALIVE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name: "courier-worker".to_string(),
            stack_size: None,
        }
    }

    /// Create a configuration with explicit worker bounds.
    pub fn with_threads(min_threads: usize, max_threads: usize) -> Self {
        Self {
            min_threads,
            max_threads,
            ..Default::default()
        }
    }

    /// Set the idle keep-alive interval.
    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Check that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(ThreadPoolError::InvalidConfig(
                "max_threads must be at least 1".to_string(),
            ));
        }
        if self.min_threads > self.max_threads {
            return Err(ThreadPoolError::InvalidConfig(format!(
                "min_threads ({}) exceeds max_threads ({})",
                self.min_threads, self.max_threads
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ThreadPoolError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// State shared between the pool handle and its workers.
struct Shared {
    config: ThreadPoolConfig,
    receiver: Receiver<Job>,
    /// Live worker count. Spawning and retiring both happen under this lock.
    workers: Mutex<usize>,
    next_worker_id: AtomicUsize,
    active_tasks: AtomicUsize,
}

impl Shared {
    fn run(&self, job: Job) {
        self.active_tasks.fetch_add(1, Ordering::AcqRel);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            tracing::error!(
                target: targets::THREADPOOL,
                "Job panicked: {}",
                panic_message(payload.as_ref())
            );
        }
        self.active_tasks.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A bounded, elastic pool of worker threads.
///
/// Dropping the pool stops accepting work; workers drain the queue and exit.
pub struct ThreadPool {
    sender: Sender<Job>,
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// Create a new thread pool with the given configuration.
    ///
    /// No threads are started until work is submitted.
    pub fn new(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    fn from_validated(config: ThreadPoolConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);
        tracing::debug!(
            target: targets::THREADPOOL,
            min_threads = config.min_threads,
            max_threads = config.max_threads,
            queue_capacity = config.queue_capacity,
            "Created worker pool"
        );
        Self {
            sender,
            shared: Arc::new(Shared {
                config,
                receiver,
                workers: Mutex::new(0),
                next_worker_id: AtomicUsize::new(1),
                active_tasks: AtomicUsize::new(0),
            }),
        }
    }

    /// Get the pool's configuration.
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.shared.config
    }

    /// Get the number of live worker threads.
    pub fn worker_count(&self) -> usize {
        *self.shared.workers.lock()
    }

    /// Get the number of jobs waiting in the queue.
    pub fn queued_jobs(&self) -> usize {
        self.sender.len()
    }

    /// Get the number of currently running jobs.
    pub fn active_tasks(&self) -> usize {
        self.shared.active_tasks.load(Ordering::Acquire)
    }

    /// Start a worker thread, optionally handing it its first job directly.
    ///
    /// Must be called with the worker-count lock held.
    fn spawn_worker(&self, workers: &mut usize, first: Option<Job>) -> std::result::Result<(), ExecuteError> {
        let id = self.shared.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.shared.config.thread_name, id));
        if let Some(stack_size) = self.shared.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // Lets us recover the first job if the thread never starts.
        let handoff = Arc::new(Mutex::new(first));
        let worker_handoff = handoff.clone();
        let shared = self.shared.clone();

        match builder.spawn(move || {
            let _span = tracing::trace_span!(target: targets::THREADPOOL, span_names::WORKER, worker = id).entered();
            let first = worker_handoff.lock().take();
            worker_loop(&shared, first);
        }) {
            Ok(_) => {
                *workers += 1;
                tracing::trace!(target: targets::THREADPOOL, worker = id, workers = *workers, "Started worker");
                Ok(())
            }
            Err(err) => {
                tracing::error!(target: targets::THREADPOOL, "Failed to spawn worker thread: {}", err);
                match handoff.lock().take() {
                    Some(job) => Err(ExecuteError::Saturated(job)),
                    None => Ok(()),
                }
            }
        }
    }
}

impl Executor for ThreadPool {
    fn execute(&self, job: Job) -> std::result::Result<(), ExecuteError> {
        let mut workers = self.shared.workers.lock();
        if *workers < self.shared.config.min_threads {
            return self.spawn_worker(&mut workers, Some(job));
        }

        match self.sender.try_send(job) {
            Ok(()) => {
                if *workers == 0 {
                    self.spawn_worker(&mut workers, None)?;
                }
                Ok(())
            }
            Err(TrySendError::Full(job)) => {
                if *workers < self.shared.config.max_threads {
                    self.spawn_worker(&mut workers, Some(job))
                } else {
                    tracing::warn!(
                        target: targets::THREADPOOL,
                        workers = *workers,
                        queued = self.sender.len(),
                        "Rejecting job: pool is saturated"
                    );
                    Err(ExecuteError::Saturated(job))
                }
            }
            Err(TrySendError::Disconnected(job)) => Err(ExecuteError::ShutDown(job)),
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("config", &self.shared.config)
            .field("workers", &self.worker_count())
            .field("queued_jobs", &self.queued_jobs())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

/// The main loop of a worker thread.
fn worker_loop(shared: &Shared, first: Option<Job>) {
    if let Some(job) = first {
        shared.run(job);
    }

    loop {
        match shared.receiver.recv_timeout(shared.config.keep_alive) {
            Ok(job) => shared.run(job),
            Err(RecvTimeoutError::Timeout) => {
                let mut workers = shared.workers.lock();
                // A submitter may have enqueued while we waited for the lock.
                if shared.receiver.is_empty() {
                    *workers -= 1;
                    tracing::trace!(target: targets::THREADPOOL, workers = *workers, "Idle worker retired");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                *shared.workers.lock() -= 1;
                return;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// A thread pool that is created on first use.
///
/// The configuration is validated up front; the pool itself (queue and
/// threads) is built at most once, the first time a job is submitted.
pub struct LazyThreadPool {
    config: ThreadPoolConfig,
    pool: OnceLock<ThreadPool>,
}

impl Default for LazyThreadPool {
    fn default() -> Self {
        Self {
            config: ThreadPoolConfig::default(),
            pool: OnceLock::new(),
        }
    }
}

impl LazyThreadPool {
    /// Create a lazy pool with the given configuration.
    pub fn new(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pool: OnceLock::new(),
        })
    }

    /// Get the pool, creating it if this is the first use.
    pub fn get(&self) -> &ThreadPool {
        self.pool
            .get_or_init(|| ThreadPool::from_validated(self.config.clone()))
    }

    /// Check whether the pool has been created yet.
    pub fn is_initialized(&self) -> bool {
        self.pool.get().is_some()
    }

    /// Get the configuration the pool is (or will be) built with.
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }
}

impl Executor for LazyThreadPool {
    fn execute(&self, job: Job) -> std::result::Result<(), ExecuteError> {
        self.get().execute(job)
    }
}

impl std::fmt::Debug for LazyThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyThreadPool")
            .field("config", &self.config)
            .field("pool", &self.pool.get())
            .finish()
    }
}
