//! Join combinators: wait for every future in a slice.
//!
//! # Semantics
//!
//! Every join is built from the same three pieces:
//!
//! - an atomic countdown initialised to the number of inputs,
//! - a *latch*: an internal promise the first non-completed input (error
//!   **or** cancellation) settles, or the last input settles with the
//!   aggregated values,
//! - the output promise, fed from the latch.
//!
//! [`FailMode`] decides when the latch is wired to the output:
//!
//! | Mode | Wired | Output resolves |
//! |------|-------|-----------------|
//! | `Fast` | immediately | at the first failure, or when all complete |
//! | `Full` | when the countdown reaches zero | only after every input settled |
//!
//! Either way the reported failure is the first one; later failures are
//! dropped by the latch's first-write-wins semantics. Only the thread whose
//! decrement reaches zero wires the output, so it happens exactly once.
//!
//! Inputs are observed inline on whichever thread settles them; the output
//! future dispatches its own continuations on the first input's executor.

use crate::future::{Future, Promise};
use crate::runtime::Executor;
use crate::tracing_compat::{debug, trace};
use crate::types::Expected;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// How a join reacts to a failed or cancelled input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FailMode {
    /// Wait for every input, then report the first failure (if any).
    #[default]
    Full,
    /// Resolve as soon as the first failure arrives.
    Fast,
}

/// Order of the values produced by [`when_all_values_ordered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aggregation {
    /// Position `i` holds the value of input `i`.
    #[default]
    InputOrder,
    /// Values appear in the order their inputs completed.
    CompletionOrder,
}

struct JoinState<T: Clone + Send + 'static> {
    remaining: AtomicUsize,
    values: Mutex<Vec<(usize, T)>>,
    latch: Promise<Vec<T>>,
    output: Promise<Vec<T>>,
    mode: FailMode,
    aggregation: Aggregation,
}

impl<T: Clone + Send + 'static> JoinState<T> {
    fn arrive(&self, index: usize, outcome: Expected<T>) {
        match outcome {
            Expected::Completed(value) => self.values.lock().push((index, value)),
            failure => {
                if self.latch.set_value(failure.convert(Vec::new())) {
                    debug!(index, mode = ?self.mode, "join latched first failure");
                }
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        let mut values = std::mem::take(&mut *self.values.lock());
        if self.aggregation == Aggregation::InputOrder {
            values.sort_unstable_by_key(|(index, _)| *index);
        }
        let won = self
            .latch
            .complete(values.into_iter().map(|(_, value)| value).collect());
        trace!(all_completed = won, "join countdown reached zero");

        if self.mode == FailMode::Full {
            wire(&self.latch, &self.output);
        }
    }
}

fn wire<T: Clone + Send + 'static>(latch: &Promise<T>, output: &Promise<T>) {
    let output = output.clone();
    latch.future().on_settled(move |outcome| {
        output.set_value(outcome);
    });
}

fn join<T>(futures: &[Future<T>], mode: FailMode, aggregation: Aggregation) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
{
    let Some(first) = futures.first() else {
        return Executor::global().ready(Vec::new());
    };
    let executor = first.executor();
    let state = Arc::new(JoinState {
        remaining: AtomicUsize::new(futures.len()),
        values: Mutex::new(Vec::with_capacity(futures.len())),
        latch: executor.promise(),
        output: executor.promise(),
        mode,
        aggregation,
    });
    let result = state.output.future();

    if mode == FailMode::Fast {
        wire(&state.latch, &state.output);
    }
    for (index, future) in futures.iter().enumerate() {
        let state = Arc::clone(&state);
        future.on_settled(move |outcome| state.arrive(index, outcome));
    }
    result
}

/// Waits for every future in `futures`.
///
/// Empty input yields an already completed future. Otherwise the result is
/// `Completed(())` if every input completed, or else the first `Error` or
/// `Cancelled` observed, delivered per `mode`.
pub fn when_all(futures: &[Future<()>], mode: FailMode) -> Future<()> {
    if futures.is_empty() {
        return Executor::global().ready(());
    }
    join(futures, mode, Aggregation::InputOrder).then_with(
        crate::types::ExecutionOptions::inline(),
        |outcome| outcome.convert(()),
    )
}

/// Waits for every future and collects their values in input order.
///
/// Failure handling is as for [`when_all`]; a failure is re-tagged to
/// `Vec<T>` and carries no partial values.
pub fn when_all_values<T>(futures: &[Future<T>], mode: FailMode) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
{
    join(futures, mode, Aggregation::InputOrder)
}

/// Like [`when_all_values`], with an explicit value order.
pub fn when_all_values_ordered<T>(
    futures: &[Future<T>],
    mode: FailMode,
    aggregation: Aggregation,
) -> Future<Vec<T>>
where
    T: Clone + Send + 'static,
{
    join(futures, mode, aggregation)
}
