//! Thread-local identity of runtime-managed threads.
//!
//! Pool workers and named context threads record what they are so that
//! [`ExecutionPolicy::Current`](crate::types::ExecutionPolicy::Current) can be
//! captured at the call site and dispatched back later.

use crate::types::ContextId;
use std::cell::RefCell;

/// What kind of thread the caller is running on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadRole {
    /// A worker of a thread pool.
    Pool,
    /// The dedicated thread of a named context.
    Named(ContextId),
    /// A timer service thread.
    Timer,
    /// A thread not managed by any runtime.
    Foreign,
}

thread_local! {
    static ROLE: RefCell<ThreadRole> = const { RefCell::new(ThreadRole::Foreign) };
}

/// Returns the role of the calling thread.
#[must_use]
pub fn current_role() -> ThreadRole {
    ROLE.with(|role| role.borrow().clone())
}

/// Returns the named context of the calling thread, if it is one.
#[must_use]
pub fn current_context() -> Option<ContextId> {
    match current_role() {
        ThreadRole::Named(id) => Some(id),
        _ => None,
    }
}

/// Marks the calling thread with `role` until the guard is dropped.
pub(crate) fn enter(role: ThreadRole) -> RoleGuard {
    let previous = ROLE.with(|current| current.replace(role));
    RoleGuard { previous }
}

/// Restores the previous thread role on drop.
#[derive(Debug)]
pub(crate) struct RoleGuard {
    previous: ThreadRole,
}

impl Drop for RoleGuard {
    fn drop(&mut self) {
        let previous = std::mem::replace(&mut self.previous, ThreadRole::Foreign);
        ROLE.with(|current| {
            current.replace(previous);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreign_by_default() {
        std::thread::spawn(|| {
            assert_eq!(current_role(), ThreadRole::Foreign);
            assert!(current_context().is_none());
        })
        .join()
        .expect("thread panicked");
    }

    #[test]
    fn guard_sets_and_restores() {
        std::thread::spawn(|| {
            {
                let _outer = enter(ThreadRole::Pool);
                assert_eq!(current_role(), ThreadRole::Pool);
                {
                    let _inner = enter(ThreadRole::Named(ContextId::new("render")));
                    assert_eq!(current_context(), Some(ContextId::new("render")));
                }
                assert_eq!(current_role(), ThreadRole::Pool);
            }
            assert_eq!(current_role(), ThreadRole::Foreign);
        })
        .join()
        .expect("thread panicked");
    }
}
