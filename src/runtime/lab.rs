//! Deterministic single-threaded scheduler for tests.
//!
//! [`LabScheduler`] queues every task instead of running it, and runs
//! nothing until the test calls [`run_one`](LabScheduler::run_one) or
//! [`run_until_idle`](LabScheduler::run_until_idle). Each task runs on the
//! test thread, marked with the thread role its policy asked for, so
//! `Current` captured inside a "named" task resolves back to that context.
//!
//! Paired with [`VirtualTimer`](super::timer::VirtualTimer), this gives
//! reproducible interleavings without real threads or sleeps.

use super::context::{self, ThreadRole};
use super::scheduler::{Scheduler, Task};
use crate::tracing_compat::trace;
use crate::types::ExecutionPolicy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
struct LabState {
    queue: VecDeque<(ExecutionPolicy, Task)>,
    placements: Vec<ExecutionPolicy>,
    executed: usize,
}

/// A FIFO scheduler driven by the test.
#[derive(Clone, Default)]
pub struct LabScheduler {
    state: Arc<Mutex<LabState>>,
}

impl fmt::Debug for LabScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LabScheduler")
            .field("pending", &state.queue.len())
            .field("executed", &state.executed)
            .finish()
    }
}

impl LabScheduler {
    /// Creates an empty lab scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns how many tasks have run so far.
    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.state.lock().executed
    }

    /// Returns the policy of every task ever scheduled, in order.
    #[must_use]
    pub fn placements(&self) -> Vec<ExecutionPolicy> {
        self.state.lock().placements.clone()
    }

    /// Runs the oldest queued task. Returns `false` if the queue was empty.
    pub fn run_one(&self) -> bool {
        // Popped under the lock, run outside it: tasks schedule more tasks.
        let Some((policy, task)) = self.state.lock().queue.pop_front() else {
            return false;
        };
        let role = match &policy {
            ExecutionPolicy::NamedThread(id) => ThreadRole::Named(id.clone()),
            _ => ThreadRole::Pool,
        };
        {
            let _role = context::enter(role);
            task();
        }
        self.state.lock().executed += 1;
        true
    }

    /// Runs tasks until none are queued, including ones queued meanwhile.
    ///
    /// Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for LabScheduler {
    fn schedule_on(&self, policy: &ExecutionPolicy, task: Task) {
        if policy.is_inline() {
            task();
            return;
        }
        let policy = match policy {
            ExecutionPolicy::Current => self.capture_current(),
            other => other.clone(),
        };
        trace!(policy = %policy, "lab task queued");
        let mut state = self.state.lock();
        state.placements.push(policy.clone());
        state.queue.push_back((policy, task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContextId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn nothing_runs_until_driven() {
        let lab = LabScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            lab.schedule_on(
                &ExecutionPolicy::ThreadPool,
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(lab.run_one());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(lab.run_until_idle(), 2);
        assert!(!lab.run_one());
        assert_eq!(lab.executed_count(), 3);
    }

    #[test]
    fn nested_tasks_run_in_fifo_order() {
        let lab = LabScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let inner_lab = lab.clone();
        let inner_order = Arc::clone(&order);
        lab.schedule_on(
            &ExecutionPolicy::ThreadPool,
            Box::new(move || {
                inner_order.lock().push("outer");
                let nested = Arc::clone(&inner_order);
                inner_lab.schedule_on(
                    &ExecutionPolicy::ThreadPool,
                    Box::new(move || nested.lock().push("nested")),
                );
            }),
        );
        let tail = Arc::clone(&order);
        lab.schedule_on(
            &ExecutionPolicy::ThreadPool,
            Box::new(move || tail.lock().push("second")),
        );

        assert_eq!(lab.run_until_idle(), 3);
        assert_eq!(*order.lock(), vec!["outer", "second", "nested"]);
    }

    #[test]
    fn named_tasks_see_their_context() {
        let lab = LabScheduler::new();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let id = ContextId::new("coordinator");
        lab.schedule_on(
            &ExecutionPolicy::NamedThread(id.clone()),
            Box::new(move || *slot.lock() = context::current_context()),
        );
        lab.run_until_idle();
        assert_eq!(*seen.lock(), Some(id.clone()));
        assert_eq!(lab.placements(), vec![ExecutionPolicy::NamedThread(id)]);
    }

    #[test]
    fn inline_is_not_queued() {
        let lab = LabScheduler::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&ran);
        lab.schedule_on(
            &ExecutionPolicy::Inline,
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(lab.placements().is_empty());
    }
}
