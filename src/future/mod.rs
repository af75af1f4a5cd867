//! Futures, promises and the launcher.
//!
//! - [`Promise`] / [`Future`]: write-once slot with continuation chaining
//! - [`spawn`]: run a body per [`ExecutionOptions`](crate::types::ExecutionOptions)
//!   and get its eventual result

pub mod launch;
pub mod promise;

pub use launch::spawn;
pub use promise::{Awaiting, Future, Promise};

use crate::error::Error;
use crate::tracing_compat::warn;
use crate::types::Expected;
use std::panic::{self, AssertUnwindSafe};

/// Runs a body or continuation, turning a panic into `Error(Panicked)`.
pub(crate) fn run_guarded<T>(f: impl FnOnce() -> Expected<T>) -> Expected<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let err = Error::panicked(payload.as_ref());
            warn!(error = %err, "user code panicked");
            Expected::Error(err)
        }
    }
}
