//! Timer-backed delay.

use crate::future::Future;
use crate::runtime::Executor;
use crate::tracing_compat::trace;
use std::time::Duration;

/// Returns a future that completes once `delay` has elapsed.
///
/// Uses the global executor's timer. The future is unsettled when returned
/// and completes exactly once, no earlier than `delay` later. It cannot be
/// cancelled.
#[must_use]
pub fn wait_async(delay: Duration) -> Future<()> {
    wait_async_on(&Executor::global(), delay)
}

pub(crate) fn wait_async_on(executor: &Executor, delay: Duration) -> Future<()> {
    let promise = executor.promise::<()>();
    let future = promise.future();
    let timer = executor.timer().schedule_once(
        delay,
        Box::new(move || {
            promise.complete(());
        }),
    );
    trace!(?timer, delay_ms = delay.as_millis(), "delay armed");
    future
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::lab_executor;

    #[test]
    fn completes_only_after_delay() {
        let (_lab, timer, executor) = lab_executor();
        let delayed = executor.wait_async(Duration::from_millis(100));
        assert!(!delayed.is_ready());

        timer.advance(Duration::from_millis(99));
        assert!(!delayed.is_ready());

        timer.advance(Duration::from_millis(1));
        assert!(delayed.try_get().is_some_and(|o| o.is_completed()));
        assert_eq!(timer.pending_count(), 0);
    }

    #[test]
    fn zero_delay_fires_on_next_advance() {
        let (_lab, timer, executor) = lab_executor();
        let delayed = executor.wait_async(Duration::ZERO);
        assert!(!delayed.is_ready());
        timer.advance(Duration::ZERO);
        assert!(delayed.is_ready());
    }

    #[test]
    fn maximal_delay_never_fires() {
        let (_lab, timer, executor) = lab_executor();
        timer.advance(Duration::from_secs(1));
        let delayed = executor.wait_async(Duration::MAX);
        assert_eq!(timer.pending_count(), 1);

        timer.advance(Duration::MAX);
        assert!(!delayed.is_ready());
        assert_eq!(timer.pending_count(), 1);
    }
}
