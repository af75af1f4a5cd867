//! Test utilities for unit tests.
//!
//! - Consistent tracing-based logging initialization
//! - Deterministic executor constructors
//! - Expected assertion macros

use crate::runtime::{Executor, InlineScheduler, LabScheduler, VirtualTimer};
use std::sync::{Arc, Mutex, MutexGuard, Once, PoisonError};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An executor that runs everything on the calling thread, with virtual time.
#[must_use]
pub fn inline_executor() -> Executor {
    Executor::new(Arc::new(InlineScheduler), Arc::new(VirtualTimer::new()))
}

/// An executor whose tasks wait in a [`LabScheduler`] until the test drives them.
#[must_use]
pub fn lab_executor() -> (LabScheduler, VirtualTimer, Executor) {
    let lab = LabScheduler::new();
    let timer = VirtualTimer::new();
    let executor = Executor::new(Arc::new(lab.clone()), Arc::new(timer.clone()));
    (lab, timer, executor)
}

/// Assert that an expected is Completed with a specific value.
#[macro_export]
macro_rules! assert_completed {
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            $crate::types::Expected::Completed(v) => assert_eq!(v, $expected),
            other => unreachable!("expected Completed({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an expected is Cancelled.
#[macro_export]
macro_rules! assert_cancelled {
    ($outcome:expr) => {
        match $outcome {
            $crate::types::Expected::Cancelled => {}
            other => unreachable!("expected Cancelled, got {:?}", other),
        }
    };
}

/// Assert that an expected is an Error of the given kind.
#[macro_export]
macro_rules! assert_error_kind {
    ($outcome:expr, $kind:expr) => {
        match $outcome {
            $crate::types::Expected::Error(e) => assert_eq!(e.kind(), $kind),
            other => unreachable!("expected Error({:?}), got {:?}", $kind, other),
        }
    };
}
