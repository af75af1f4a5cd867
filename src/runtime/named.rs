//! Dedicated threads for [`ExecutionPolicy::NamedThread`].
//!
//! [`ExecutionPolicy::NamedThread`]: crate::types::ExecutionPolicy::NamedThread
//!
//! Each [`ContextId`] maps to exactly one thread that runs its tasks in FIFO
//! order. Threads are spawned the first time a context is targeted (or
//! eagerly via [`NamedContexts::ensure`]) and live until shutdown.

use super::context::{self, ThreadRole};
use super::pool::run_task;
use super::scheduler::Task;
use crate::tracing_compat::{debug, warn};
use crate::types::ContextId;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

#[derive(Default)]
struct ContextQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl ContextQueue {
    fn push(&self, task: Task) -> bool {
        let mut state = self.state.lock();
        if state.shutdown {
            return false;
        }
        state.tasks.push_back(task);
        drop(state);
        self.condvar.notify_one();
        true
    }

    /// Blocks until a task is available; `None` once shut down and drained.
    fn pop(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                return None;
            }
            self.condvar.wait(&mut state);
        }
    }

    fn close(&self) {
        self.state.lock().shutdown = true;
        self.condvar.notify_all();
    }

    fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }
}

struct ContextThread {
    queue: Arc<ContextQueue>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    threads: HashMap<ContextId, ContextThread>,
    shutdown: bool,
}

/// Registry of named context threads.
pub struct NamedContexts {
    thread_name_prefix: String,
    registry: Mutex<Registry>,
}

impl fmt::Debug for NamedContexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedContexts")
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("contexts", &self.ids())
            .finish()
    }
}

impl NamedContexts {
    /// Creates an empty registry. Thread names are `{prefix}-{context}`.
    #[must_use]
    pub fn new(thread_name_prefix: impl Into<String>) -> Self {
        Self {
            thread_name_prefix: thread_name_prefix.into(),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Spawns the thread for `id` if it does not exist yet.
    pub fn ensure(&self, id: &ContextId) {
        let _ = self.queue_for(id);
    }

    /// Queues `task` on the thread for `id`, spawning it if needed.
    ///
    /// Returns `false` (and drops the task) after shutdown.
    pub fn execute(&self, id: &ContextId, task: Task) -> bool {
        let Some(queue) = self.queue_for(id) else {
            warn!(context = %id, "named contexts are shut down; dropping task");
            return false;
        };
        if queue.push(task) {
            true
        } else {
            warn!(context = %id, "named context is shut down; dropping task");
            false
        }
    }

    /// Returns the ids of every spawned context, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ContextId> {
        let mut ids: Vec<_> = self.registry.lock().threads.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of tasks queued on `id`.
    #[must_use]
    pub fn pending_count(&self, id: &ContextId) -> usize {
        self.registry
            .lock()
            .threads
            .get(id)
            .map_or(0, |context| context.queue.len())
    }

    /// Closes every context and joins its thread after it drains.
    pub fn shutdown(&self) {
        let threads: Vec<_> = {
            let mut registry = self.registry.lock();
            registry.shutdown = true;
            registry.threads.drain().collect()
        };
        let current = thread::current().id();
        for (id, mut context) in threads {
            context.queue.close();
            if let Some(handle) = context.handle.take() {
                if handle.thread().id() != current {
                    let _ = handle.join();
                }
            }
            debug!(context = %id, "named context stopped");
        }
    }

    fn queue_for(&self, id: &ContextId) -> Option<Arc<ContextQueue>> {
        let mut registry = self.registry.lock();
        if registry.shutdown {
            return None;
        }
        if let Some(context) = registry.threads.get(id) {
            return Some(Arc::clone(&context.queue));
        }

        let queue = Arc::new(ContextQueue::default());
        let thread_queue = Arc::clone(&queue);
        let thread_id = id.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.thread_name_prefix, id))
            .spawn(move || {
                let _role = context::enter(ThreadRole::Named(thread_id));
                while let Some(task) = thread_queue.pop() {
                    run_task(task);
                }
            })
            .expect("failed to spawn named context thread");
        debug!(context = %id, "named context started");

        registry.threads.insert(
            id.clone(),
            ContextThread {
                queue: Arc::clone(&queue),
                handle: Some(handle),
            },
        );
        Some(queue)
    }
}

impl Drop for NamedContexts {
    fn drop(&mut self) {
        self.shutdown();
    }
}
