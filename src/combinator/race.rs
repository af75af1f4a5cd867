//! Race combinator: the first future to settle wins.
//!
//! Every input offers its outcome to one shared promise; first-write-wins
//! picks the winner, whether it completed, failed or was cancelled. Losers
//! keep running and their outcomes are discarded. Nothing is cancelled on
//! their behalf.

use crate::error::Error;
use crate::future::Future;
use crate::runtime::Executor;
use crate::tracing_compat::trace;

/// Resolves with the outcome of whichever future in `futures` settles first.
///
/// Empty input yields an `InvalidArgument` error immediately.
pub fn when_any<T>(futures: &[Future<T>]) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let Some(first) = futures.first() else {
        return Executor::global().failed(Error::invalid_argument(
            "when_any requires at least one future",
        ));
    };
    let promise = first.executor().promise::<T>();
    let result = promise.future();

    for (index, future) in futures.iter().enumerate() {
        let promise = promise.clone();
        future.on_settled(move |outcome| {
            if promise.set_value(outcome) {
                trace!(index, "when_any winner");
            }
        });
    }
    result
}
