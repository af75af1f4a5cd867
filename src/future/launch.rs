//! Launching a body onto an execution context.

use super::{run_guarded, Future};
use crate::runtime::Executor;
use crate::tracing_compat::{debug, trace};
use crate::types::{CancellationHandle, ExecutionOptions, Expected};

/// Runs `function` on the global executor and returns its eventual result.
///
/// The body is placed according to `options.policy` (`Current` is captured
/// on the calling thread, `Inline` runs before `spawn` returns).
/// Cancellation through `options` is cooperative:
///
/// - cancelled before the body starts: the body never runs and the result
///   is `Cancelled`;
/// - cancelled while the body runs: the body finishes, its value is
///   discarded and the result is `Cancelled`.
///
/// A `cancel()` racing the end of the body yields either `Completed` or
/// `Cancelled`, and the future never changes once settled.
///
/// ```no_run
/// use expectant::{spawn, ExecutionOptions, Expected};
///
/// let answer = spawn(|| Expected::Completed(42), ExecutionOptions::thread_pool())
///     .map(|v| v + 1);
/// ```
pub fn spawn<T, F>(function: F, options: ExecutionOptions) -> Future<T>
where
    T: Clone + Send + 'static,
    F: FnOnce() -> Expected<T> + Send + 'static,
{
    spawn_on(&Executor::global(), function, options)
}

pub(crate) fn spawn_on<T, F>(executor: &Executor, function: F, options: ExecutionOptions) -> Future<T>
where
    T: Clone + Send + 'static,
    F: FnOnce() -> Expected<T> + Send + 'static,
{
    let (policy, cancellation) = options.into_parts();
    let policy = executor.capture(policy);
    let promise = executor.promise::<T>();
    let future = promise.future();
    debug!(policy = %policy, cancellable = cancellation.is_some(), "spawning body");

    executor.dispatch(
        &policy,
        Box::new(move || {
            let cancelled = || {
                cancellation
                    .as_ref()
                    .is_some_and(CancellationHandle::is_cancelled)
            };
            if cancelled() {
                trace!("body skipped after cancellation");
                promise.set_value(Expected::Cancelled);
                return;
            }
            let outcome = run_guarded(function);
            if cancelled() {
                trace!("body result discarded after cancellation");
                promise.set_value(Expected::Cancelled);
            } else {
                promise.set_value(outcome);
            }
        }),
    );
    future
}
