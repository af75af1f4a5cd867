//! The single-assignment result channel.
//!
//! A [`Promise`] is the write side and a [`Future`] the read side of one
//! shared slot. Settlement is first-write-wins: a compare-and-set on a claim
//! flag picks exactly one writer, which then stores the value and drains the
//! pending continuations outside the lock. A continuation registered after
//! settlement runs immediately on the registering thread.
//!
//! When the last `Promise` handle of an unsettled slot is dropped, the slot
//! settles as [`ErrorKind::BrokenPromise`](crate::error::ErrorKind::BrokenPromise).

use super::run_guarded;
use crate::error::Error;
use crate::runtime::Executor;
use crate::tracing_compat::trace;
use crate::types::{CancellationHandle, ExecutionOptions, Expected};
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

type Continuation<T> = Box<dyn FnOnce(Expected<T>) + Send + 'static>;

enum State<T> {
    Pending(SmallVec<[Continuation<T>; 2]>),
    Settled(Expected<T>),
}

struct Shared<T> {
    claimed: AtomicBool,
    state: Mutex<State<T>>,
    settled: Condvar,
    executor: Executor,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn new(executor: Executor) -> Self {
        Self {
            claimed: AtomicBool::new(false),
            state: Mutex::new(State::Pending(SmallVec::new())),
            settled: Condvar::new(),
            executor,
        }
    }

    fn settle(&self, outcome: Expected<T>) -> bool {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("promise already settled; ignoring value");
            return false;
        }
        trace!(
            completed = outcome.is_completed(),
            cancelled = outcome.is_cancelled(),
            "promise settled"
        );

        let waiting = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending(waiting) => waiting,
                State::Settled(_) => SmallVec::new(),
            }
        };
        self.settled.notify_all();

        for continuation in waiting {
            continuation(outcome.clone());
        }
        true
    }

    fn subscribe(&self, continuation: Continuation<T>) {
        let outcome = {
            let mut state = self.state.lock();
            match &mut *state {
                State::Pending(waiting) => {
                    waiting.push(continuation);
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        continuation(outcome);
    }

    fn peek(&self) -> Option<Expected<T>> {
        match &*self.state.lock() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        }
    }
}

/// Settles the slot as broken once every producer handle is gone.
struct Writer<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Drop for Writer<T> {
    fn drop(&mut self) {
        if !self.shared.claimed.load(Ordering::Acquire)
            && self
                .shared
                .settle(Expected::Error(Error::broken_promise()))
        {
            trace!("promise dropped unsettled");
        }
    }
}

/// The write side of a [`Future`].
///
/// Cloning yields another producer for the same slot; only the first
/// [`set_value`](Self::set_value) among all clones has any effect.
pub struct Promise<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
    writer: Arc<Writer<T>>,
}

impl<T: Clone + Send + 'static> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates an unsettled promise on the global executor.
    #[must_use]
    pub fn new() -> Self {
        Self::with_executor(Executor::global())
    }

    /// Creates an unsettled promise whose futures dispatch on `executor`.
    #[must_use]
    pub fn with_executor(executor: Executor) -> Self {
        let shared = Arc::new(Shared::new(executor));
        let writer = Arc::new(Writer {
            shared: Arc::clone(&shared),
        });
        Self { shared, writer }
    }

    /// Returns a read handle.
    #[must_use]
    pub fn future(&self) -> Future<T> {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Settles the promise. Only the first call across all clones wins.
    ///
    /// Returns `true` if this call settled the promise.
    pub fn set_value(&self, outcome: Expected<T>) -> bool {
        self.shared.settle(outcome)
    }

    /// Settles with `Completed(value)`.
    pub fn complete(&self, value: T) -> bool {
        self.set_value(Expected::Completed(value))
    }

    /// Settles with `Error(error)`.
    pub fn fail(&self, error: Error) -> bool {
        self.set_value(Expected::Error(error))
    }

    /// Settles with `Cancelled`.
    pub fn cancel(&self) -> bool {
        self.set_value(Expected::Cancelled)
    }

    /// Returns true once any producer has settled the promise.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.shared.claimed.load(Ordering::Acquire)
    }
}

/// The read side of a [`Promise`]: an eventual [`Expected<T>`].
///
/// Futures are cheap to clone; every clone observes the same outcome.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// A future on the global executor, already completed with `value`.
    #[must_use]
    pub fn ready(value: T) -> Self {
        Executor::global().ready(value)
    }

    /// A future on the global executor, already failed with `error`.
    #[must_use]
    pub fn failed(error: Error) -> Self {
        Executor::global().failed(error)
    }

    /// A future on the global executor, already cancelled.
    #[must_use]
    pub fn cancelled() -> Self {
        Executor::global().cancelled()
    }

    /// A future on the global executor, already settled with `outcome`.
    #[must_use]
    pub fn from_expected(outcome: Expected<T>) -> Self {
        Executor::global().from_expected(outcome)
    }

    /// Returns the executor continuations of this future dispatch on.
    #[must_use]
    pub fn executor(&self) -> &Executor {
        &self.shared.executor
    }

    /// Returns true once the future has settled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.peek().is_some()
    }

    /// Returns the outcome if settled, without blocking.
    #[must_use]
    pub fn try_get(&self) -> Option<Expected<T>> {
        self.shared.peek()
    }

    /// Blocks the calling thread until settled or `timeout` elapses.
    ///
    /// For program edges and tests. Blocking a runtime thread on a future
    /// that needs the same thread to settle will time out.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Expected<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let State::Settled(outcome) = &*state {
                return Some(outcome.clone());
            }
            if self
                .shared
                .settled
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return match &*state {
                    State::Settled(outcome) => Some(outcome.clone()),
                    State::Pending(_) => None,
                };
            }
        }
    }

    /// Registers a tri-state continuation with default options.
    ///
    /// `f` always runs, whatever the outcome of this future.
    pub fn then<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Expected<T>) -> Expected<U> + Send + 'static,
    {
        self.then_with(ExecutionOptions::default(), f)
    }

    /// Registers a tri-state continuation.
    ///
    /// `Current` is captured now, on the calling thread. If the options'
    /// cancellation handle has fired by the time the continuation is about
    /// to run, `f` is skipped and the result is `Cancelled`. A panic in `f`
    /// settles the result as `Error(Panicked)`.
    pub fn then_with<U, F>(&self, options: ExecutionOptions, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Expected<T>) -> Expected<U> + Send + 'static,
    {
        let executor = self.shared.executor.clone();
        let (policy, cancellation) = options.into_parts();
        let policy = executor.capture(policy);
        let promise = executor.promise::<U>();
        let future = promise.future();

        self.on_settled(move |outcome| {
            let task = Box::new(move || {
                let result = if cancellation
                    .as_ref()
                    .is_some_and(CancellationHandle::is_cancelled)
                {
                    trace!("continuation skipped after cancellation");
                    Expected::Cancelled
                } else {
                    run_guarded(move || f(outcome))
                };
                promise.set_value(result);
            });
            executor.dispatch(&policy, task);
        });
        future
    }

    /// Registers a value continuation with default options.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.map_with(ExecutionOptions::default(), f)
    }

    /// Registers a value continuation.
    ///
    /// `f` runs only if this future completed; an `Error` or `Cancelled`
    /// outcome is forwarded to the result without calling it.
    pub fn map_with<U, F>(&self, options: ExecutionOptions, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then_with(options, move |outcome| outcome.map(f))
    }

    /// Registers a fallible value continuation with default options.
    pub fn and_then<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Expected<U> + Send + 'static,
    {
        self.and_then_with(ExecutionOptions::default(), f)
    }

    /// Like [`map_with`](Self::map_with), for a continuation that may itself
    /// fail or cancel.
    pub fn and_then_with<U, F>(&self, options: ExecutionOptions, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Expected<U> + Send + 'static,
    {
        self.then_with(options, move |outcome| match outcome {
            Expected::Completed(value) => f(value),
            Expected::Error(err) => Expected::Error(err),
            Expected::Cancelled => Expected::Cancelled,
        })
    }

    /// Runs `f` on the settling thread with the outcome, without dispatch.
    pub(crate) fn on_settled<F>(&self, f: F)
    where
        F: FnOnce(Expected<T>) + Send + 'static,
    {
        self.shared.subscribe(Box::new(f));
    }
}

/// Awaits a [`Future`] from any `async` context.
pub struct Awaiting<T> {
    future: Future<T>,
    slot: Option<Arc<Mutex<AwaitSlot<T>>>>,
}

struct AwaitSlot<T> {
    outcome: Option<Expected<T>>,
    waker: Option<Waker>,
}

impl<T: Clone + Send + 'static> std::future::Future for Awaiting<T> {
    type Output = Expected<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Awaiting { future, slot } = self.get_mut();
        if let Some(outcome) = future.try_get() {
            return Poll::Ready(outcome);
        }

        let slot = slot.get_or_insert_with(|| {
            let slot = Arc::new(Mutex::new(AwaitSlot {
                outcome: None,
                waker: None,
            }));
            let filler = Arc::clone(&slot);
            future.on_settled(move |outcome| {
                let waker = {
                    let mut slot = filler.lock();
                    slot.outcome = Some(outcome);
                    slot.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            });
            slot
        });

        let mut slot = slot.lock();
        match slot.outcome.take() {
            Some(outcome) => Poll::Ready(outcome),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T: Clone + Send + 'static> std::future::IntoFuture for Future<T> {
    type Output = Expected<T>;
    type IntoFuture = Awaiting<T>;

    fn into_future(self) -> Self::IntoFuture {
        Awaiting {
            future: self,
            slot: None,
        }
    }
}
