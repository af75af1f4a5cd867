//! The scheduler/timer pair every future dispatches through.
//!
//! A [`Future`] remembers the [`Executor`] it was created on, and every
//! future derived from it (by `then*` or a combinator) inherits the same
//! executor. Entry points that take no executor use [`Executor::global`],
//! backed by a lazily started process-wide [`Runtime`].

use super::builder::{Runtime, RuntimeBuilder};
use super::config::RuntimeConfig;
use super::scheduler::{Scheduler, Task};
use super::timer::Timer;
use crate::combinator::delay;
use crate::future::{launch, Future, Promise};
use crate::error::Error;
use crate::tracing_compat::{trace, warn};
use crate::types::{ExecutionOptions, ExecutionPolicy, Expected};
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Returns the process-wide runtime, starting it on first use.
///
/// Configured from `EXPECTANT_*` environment variables; an invalid variable
/// is logged and the defaults are used instead. The global runtime is never
/// shut down.
pub fn global_runtime() -> &'static Runtime {
    GLOBAL.get_or_init(|| {
        let config = match RuntimeBuilder::new().with_env_overrides() {
            Ok(builder) => builder.resolved_config(),
            Err(err) => {
                warn!(error = %err, "ignoring invalid environment configuration for the global runtime");
                RuntimeConfig::default()
            }
        };
        Runtime::start(config)
    })
}

/// A scheduler and a timer, shared by a family of futures.
#[derive(Clone)]
pub struct Executor {
    scheduler: Arc<dyn Scheduler>,
    timer: Arc<dyn Timer>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl Executor {
    /// Creates an executor from explicit collaborators.
    #[must_use]
    pub fn new(scheduler: Arc<dyn Scheduler>, timer: Arc<dyn Timer>) -> Self {
        Self { scheduler, timer }
    }

    /// Returns an executor on the process-wide runtime.
    #[must_use]
    pub fn global() -> Self {
        global_runtime().executor()
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Returns the timer.
    #[must_use]
    pub fn timer(&self) -> &dyn Timer {
        self.timer.as_ref()
    }

    /// Resolves `Current` against the calling thread; other policies pass through.
    #[must_use]
    pub fn capture(&self, policy: ExecutionPolicy) -> ExecutionPolicy {
        match policy {
            ExecutionPolicy::Current => self.scheduler.capture_current(),
            other => other,
        }
    }

    /// Runs `task` according to an already captured policy.
    ///
    /// `Inline` runs on the calling thread without touching the scheduler.
    pub fn dispatch(&self, policy: &ExecutionPolicy, task: Task) {
        if policy.is_inline() {
            task();
        } else {
            trace!(policy = %policy, "dispatching task");
            self.scheduler.schedule_on(policy, task);
        }
    }

    /// Creates an unsettled promise whose futures dispatch on this executor.
    #[must_use]
    pub fn promise<T: Clone + Send + 'static>(&self) -> Promise<T> {
        Promise::with_executor(self.clone())
    }

    /// Runs `function` per `options` and returns its eventual result.
    ///
    /// See [`spawn`](crate::future::spawn).
    pub fn spawn<T, F>(&self, function: F, options: ExecutionOptions) -> Future<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce() -> Expected<T> + Send + 'static,
    {
        launch::spawn_on(self, function, options)
    }

    /// Returns a future completing once `delay` has elapsed on this
    /// executor's timer.
    #[must_use]
    pub fn wait_async(&self, delay: Duration) -> Future<()> {
        delay::wait_async_on(self, delay)
    }

    /// Returns a future already settled with `outcome`.
    #[must_use]
    pub fn from_expected<T: Clone + Send + 'static>(&self, outcome: Expected<T>) -> Future<T> {
        let promise = self.promise();
        promise.set_value(outcome);
        promise.future()
    }

    /// Returns a future already completed with `value`.
    #[must_use]
    pub fn ready<T: Clone + Send + 'static>(&self, value: T) -> Future<T> {
        self.from_expected(Expected::Completed(value))
    }

    /// Returns a future already failed with `error`.
    #[must_use]
    pub fn failed<T: Clone + Send + 'static>(&self, error: Error) -> Future<T> {
        self.from_expected(Expected::Error(error))
    }

    /// Returns a future already cancelled.
    #[must_use]
    pub fn cancelled<T: Clone + Send + 'static>(&self) -> Future<T> {
        self.from_expected(Expected::Cancelled)
    }
}
