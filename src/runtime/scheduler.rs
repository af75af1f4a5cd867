//! The scheduling interface consumed by futures and the launcher.
//!
//! The composition layer never assumes a particular thread pool. It talks to
//! a [`Scheduler`], which only has to enqueue a [`Task`] somewhere that
//! honours the requested [`ExecutionPolicy`], and run it at most once.

use super::context::{self, ThreadRole};
use crate::types::ExecutionPolicy;

/// A unit of work handed to a scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Places tasks on execution contexts.
pub trait Scheduler: Send + Sync + 'static {
    /// Enqueues `task` according to `policy`.
    ///
    /// `Current` has already been resolved by [`capture_current`] when the
    /// task comes from this crate; implementations receiving it anyway
    /// should capture at this point. A task that cannot be run (for example
    /// after shutdown) must be dropped, never run twice.
    ///
    /// [`capture_current`]: Scheduler::capture_current
    fn schedule_on(&self, policy: &ExecutionPolicy, task: Task);

    /// Resolves [`ExecutionPolicy::Current`] for the calling thread.
    ///
    /// The default maps a named context thread to itself and everything
    /// else to the pool, since only managed threads have a loop to dispatch
    /// back to.
    fn capture_current(&self) -> ExecutionPolicy {
        match context::current_role() {
            ThreadRole::Named(id) => ExecutionPolicy::NamedThread(id),
            ThreadRole::Pool | ThreadRole::Timer | ThreadRole::Foreign => {
                ExecutionPolicy::ThreadPool
            }
        }
    }
}

/// Runs every task immediately on the calling thread, whatever the policy.
///
/// Useful where placement does not matter and no threads should be spawned.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn schedule_on(&self, _policy: &ExecutionPolicy, task: Task) {
        task();
    }

    fn capture_current(&self) -> ExecutionPolicy {
        ExecutionPolicy::Inline
    }
}
