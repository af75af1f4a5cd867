//! Cooperative cancellation handle.
//!
//! Cancellation here is a request, not an interrupt. A [`CancellationHandle`]
//! is a shared one-way flag: once cancelled it stays cancelled. The launcher
//! and continuation machinery consult it at three points:
//!
//! 1. before starting a launched body (skip it, settle `Cancelled`),
//! 2. before running a continuation (skip it, settle `Cancelled`),
//! 3. when committing a launched body's result (replace it with `Cancelled`).
//!
//! Code that is already running is never stopped. A `cancel()` that races
//! with a commit resolves to exactly one of `Completed` or `Cancelled`.

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared, thread-safe, one-way cancellation flag.
///
/// Cloning produces another owner of the same flag.
#[derive(Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Creates a new, active handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Returns `true` for the call that moved the handle from active to
    /// cancelled; every later call is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        let transitioned = self
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if transitioned {
            crate::tracing_compat::debug!("cancellation requested");
        }
        transitioned
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any owner.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns true if both handles share the same flag.
    #[must_use]
    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

impl fmt::Debug for CancellationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
