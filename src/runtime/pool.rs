//! Elastic worker pool backing [`ExecutionPolicy::ThreadPool`].
//!
//! [`ExecutionPolicy::ThreadPool`]: crate::types::ExecutionPolicy::ThreadPool
//!
//! - **Capacity management**: `min_threads` are spawned eagerly; more are
//!   spawned on demand up to `max_threads` when every worker is busy.
//! - **Retirement**: workers above `min_threads` exit after sitting idle for
//!   `idle_timeout`.
//! - **Fairness**: FIFO through a lock-free injection queue.
//! - **Shutdown**: queued tasks keep draining; new tasks are dropped.
//!
//! A task that panics is caught and logged; the worker keeps running.

use super::context::{self, ThreadRole};
use super::scheduler::Task;
use crate::tracing_compat::{error, trace, warn};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default idle timeout before retiring excess threads.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration options for the worker pool.
#[derive(Clone)]
pub struct WorkerPoolOptions {
    /// Idle timeout before retiring excess threads.
    pub idle_timeout: Duration,
    /// Thread name prefix.
    pub thread_name_prefix: String,
    /// Callback when a thread starts.
    pub on_thread_start: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Callback when a thread stops.
    pub on_thread_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for WorkerPoolOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            thread_name_prefix: "expectant".to_string(),
            on_thread_start: None,
            on_thread_stop: None,
        }
    }
}

impl fmt::Debug for WorkerPoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPoolOptions")
            .field("idle_timeout", &self.idle_timeout)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("on_thread_start", &self.on_thread_start.is_some())
            .field("on_thread_stop", &self.on_thread_stop.is_some())
            .finish()
    }
}

struct PoolInner {
    min_threads: usize,
    max_threads: usize,
    /// Threads currently alive.
    active_threads: AtomicUsize,
    /// Threads currently executing a task.
    busy_threads: AtomicUsize,
    pending_count: AtomicUsize,
    /// Monotonic counter used to name threads.
    spawned_total: AtomicUsize,
    queue: SegQueue<Task>,
    shutdown: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
    options: WorkerPoolOptions,
    thread_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// A pool of worker threads.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("min_threads", &self.inner.min_threads)
            .field("max_threads", &self.inner.max_threads)
            .field("active_threads", &self.active_threads())
            .field("pending_tasks", &self.pending_count())
            .finish()
    }
}

impl WorkerPool {
    /// Creates a pool with the given thread limits and default options.
    ///
    /// # Panics
    ///
    /// Panics if `max_threads` is 0.
    #[must_use]
    pub fn new(min_threads: usize, max_threads: usize) -> Self {
        Self::with_options(min_threads, max_threads, WorkerPoolOptions::default())
    }

    /// Creates a pool with custom options.
    ///
    /// # Panics
    ///
    /// Panics if `max_threads` is 0.
    #[must_use]
    pub fn with_options(min_threads: usize, max_threads: usize, options: WorkerPoolOptions) -> Self {
        assert!(max_threads > 0, "max_threads must be at least 1");
        let max_threads = max_threads.max(min_threads);

        let inner = Arc::new(PoolInner {
            min_threads,
            max_threads,
            active_threads: AtomicUsize::new(0),
            busy_threads: AtomicUsize::new(0),
            pending_count: AtomicUsize::new(0),
            spawned_total: AtomicUsize::new(0),
            queue: SegQueue::new(),
            shutdown: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
            options,
            thread_handles: Mutex::new(Vec::with_capacity(max_threads)),
        });

        for _ in 0..min_threads {
            spawn_worker(&inner);
        }

        Self { inner }
    }

    /// Queues a task.
    ///
    /// Returns `false` (and drops the task) if the pool is shut down.
    pub fn execute(&self, task: Task) -> bool {
        if self.is_shutdown() {
            warn!("worker pool is shut down; dropping task");
            return false;
        }

        self.inner.queue.push(task);
        self.inner.pending_count.fetch_add(1, Ordering::AcqRel);
        maybe_spawn_worker(&self.inner);

        let _guard = self.inner.mutex.lock();
        self.inner.condvar.notify_one();
        true
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Acquire)
    }

    /// Returns the number of live worker threads.
    #[must_use]
    pub fn active_threads(&self) -> usize {
        self.inner.active_threads.load(Ordering::Acquire)
    }

    /// Returns the number of workers currently executing a task.
    #[must_use]
    pub fn busy_threads(&self) -> usize {
        self.inner.busy_threads.load(Ordering::Acquire)
    }

    /// Returns `true` once shutdown has started.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Stops accepting tasks. Queued tasks still run.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        let _guard = self.inner.mutex.lock();
        self.inner.condvar.notify_all();
    }

    /// Shuts down and waits for every worker to exit.
    ///
    /// Returns `true` if all workers exited within `timeout`.
    pub fn shutdown_and_wait(&self, timeout: Duration) -> bool {
        self.shutdown();

        let current = thread::current().id();
        // A worker dropping the last pool handle cannot wait for itself.
        let own_worker = usize::from(
            self.inner
                .thread_handles
                .lock()
                .iter()
                .any(|handle| handle.thread().id() == current),
        );

        let deadline = Instant::now() + timeout;
        while self.inner.active_threads.load(Ordering::Acquire) > own_worker {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            {
                let _guard = self.inner.mutex.lock();
                self.inner.condvar.notify_all();
            }
            thread::sleep(Duration::from_millis(5).min(remaining));
        }

        let handles: Vec<_> = self.inner.thread_handles.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown_and_wait(Duration::from_secs(5));
    }
}

fn spawn_worker(inner: &Arc<PoolInner>) {
    let worker_inner = Arc::clone(inner);
    inner.active_threads.fetch_add(1, Ordering::AcqRel);
    let index = inner.spawned_total.fetch_add(1, Ordering::Relaxed);
    let name = format!("{}-worker-{index}", inner.options.thread_name_prefix);

    let handle = thread::Builder::new()
        .name(name)
        .spawn(move || {
            let _role = context::enter(ThreadRole::Pool);
            if let Some(callback) = &worker_inner.options.on_thread_start {
                callback();
            }

            let exit = worker_loop(&worker_inner);

            if let Some(callback) = &worker_inner.options.on_thread_stop {
                callback();
            }
            // A retired worker gave up its slot when it decided to leave.
            if exit == WorkerExit::Shutdown {
                worker_inner.active_threads.fetch_sub(1, Ordering::AcqRel);
            }
        })
        .expect("failed to spawn worker thread");

    inner.thread_handles.lock().push(handle);
}

fn maybe_spawn_worker(inner: &Arc<PoolInner>) {
    let active = inner.active_threads.load(Ordering::Acquire);
    let busy = inner.busy_threads.load(Ordering::Acquire);
    let pending = inner.pending_count.load(Ordering::Acquire);

    // Spawn while there is more queued work than idle workers to take it.
    let idle = active.saturating_sub(busy);
    if active < inner.max_threads && pending > idle {
        spawn_worker(inner);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerExit {
    Shutdown,
    Retired,
}

/// Claims one slot above `min_threads`, so concurrent retirements can never
/// take the pool below its floor.
fn try_retire(inner: &PoolInner) -> bool {
    let mut active = inner.active_threads.load(Ordering::Acquire);
    while active > inner.min_threads {
        match inner.active_threads.compare_exchange_weak(
            active,
            active - 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => return true,
            Err(observed) => active = observed,
        }
    }
    false
}

fn worker_loop(inner: &PoolInner) -> WorkerExit {
    loop {
        if let Some(task) = inner.queue.pop() {
            // Busy before no-longer-pending, so the task is never invisible
            // to `maybe_spawn_worker`.
            inner.busy_threads.fetch_add(1, Ordering::AcqRel);
            inner.pending_count.fetch_sub(1, Ordering::AcqRel);
            run_task(task);
            inner.busy_threads.fetch_sub(1, Ordering::AcqRel);
            continue;
        }

        if inner.shutdown.load(Ordering::Acquire) {
            return WorkerExit::Shutdown;
        }

        let mut guard = inner.mutex.lock();
        // Re-check under the lock so a push + notify cannot slip in between.
        if !inner.queue.is_empty() || inner.shutdown.load(Ordering::Acquire) {
            continue;
        }

        if inner.active_threads.load(Ordering::Acquire) > inner.min_threads {
            let timed_out = inner
                .condvar
                .wait_for(&mut guard, inner.options.idle_timeout)
                .timed_out();
            if timed_out && inner.queue.is_empty() && try_retire(inner) {
                trace!("retiring idle worker");
                return WorkerExit::Retired;
            }
        } else {
            inner.condvar.wait(&mut guard);
        }
    }
}

pub(crate) fn run_task(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let err = crate::error::Error::panicked(payload.as_ref());
        error!(error = %err, "task panicked on runtime thread");
    }
}
