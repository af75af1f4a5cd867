//! One-shot timer service.
//!
//! [`Timer`] is the interface consumed by [`wait_async`]; two implementations
//! ship here:
//!
//! - [`TimerThread`]: a dedicated thread sleeping until the earliest deadline
//!   in a min-heap.
//! - [`VirtualTimer`]: manual time for deterministic tests; callbacks fire
//!   only when [`VirtualTimer::advance`] moves past their deadline.
//!
//! [`wait_async`]: crate::combinator::wait_async

use super::context::{self, ThreadRole};
use super::pool::run_task;
use super::scheduler::Task;
use crate::tracing_compat::{debug, trace};
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Identifies a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Invokes a callback once after a delay.
pub trait Timer: Send + Sync + 'static {
    /// Schedules `callback` to run once, no earlier than `delay` from now.
    fn schedule_once(&self, delay: Duration, callback: Task) -> TimerId;

    /// Cancels a timer that has not fired. Returns `true` if it was pending.
    fn cancel(&self, id: TimerId) -> bool;
}

/// When a timer fires. `Never` sorts after every instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Deadline<I> {
    At(I),
    Never,
}

/// A timer entry in the heap.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct TimerEntry<I> {
    deadline: Deadline<I>,
    id: TimerId,
}

impl<I: Ord> Ord for TimerEntry<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl<I: Ord> PartialOrd for TimerEntry<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A min-heap of callbacks ordered by deadline.
///
/// Cancellation removes the callback and leaves the heap entry to be
/// skipped when it surfaces.
struct TimerHeap<I> {
    heap: BinaryHeap<TimerEntry<I>>,
    callbacks: HashMap<TimerId, Task>,
    next_id: u64,
}

impl<I: Ord + Copy> TimerHeap<I> {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            callbacks: HashMap::new(),
            next_id: 0,
        }
    }

    fn len(&self) -> usize {
        self.callbacks.len()
    }

    fn insert(&mut self, deadline: Deadline<I>, callback: Task) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(TimerEntry { deadline, id });
        self.callbacks.insert(id, callback);
        id
    }

    /// Removes a pending callback and hands it back so the caller can drop
    /// it outside any lock.
    fn cancel(&mut self, id: TimerId) -> Option<Task> {
        self.callbacks.remove(&id)
    }

    /// Returns the earliest live deadline, discarding cancelled entries.
    fn peek_deadline(&mut self) -> Option<Deadline<I>> {
        while let Some(entry) = self.heap.peek() {
            if self.callbacks.contains_key(&entry.id) {
                return Some(entry.deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops every callback whose deadline is `<= now`, earliest first.
    fn pop_expired(&mut self, now: I) -> Vec<Task> {
        let mut expired = Vec::new();
        while let Some(entry) = self.heap.peek().copied() {
            if entry.deadline > Deadline::At(now) {
                break;
            }
            self.heap.pop();
            if let Some(callback) = self.callbacks.remove(&entry.id) {
                expired.push(callback);
            }
        }
        expired
    }
}

struct TimerState {
    heap: TimerHeap<Instant>,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
}

/// Wall-clock timer running callbacks on its own thread.
pub struct TimerThread {
    shared: Arc<TimerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for TimerThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerThread")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl TimerThread {
    /// Starts the timer thread with the given name.
    #[must_use]
    pub fn start(thread_name: impl Into<String>) -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                heap: TimerHeap::new(),
                shutdown: false,
            }),
            condvar: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || {
                let _role = context::enter(ThreadRole::Timer);
                timer_loop(&thread_shared);
            })
            .expect("failed to spawn timer thread");

        Self {
            shared,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Returns the number of timers that have not fired.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().heap.len()
    }

    /// Stops the thread. Pending callbacks are dropped without running.
    ///
    /// Dropping a callback may settle a promise and run its continuations on
    /// this thread, so the heap is released only after the lock is.
    pub fn shutdown(&self) {
        let pending = {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            std::mem::replace(&mut state.heap, TimerHeap::new())
        };
        self.shared.condvar.notify_all();
        let dropped = pending.len();
        if dropped != 0 {
            debug!(dropped, "timer shut down with pending callbacks");
        }
        drop(pending);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Timer for TimerThread {
    fn schedule_once(&self, delay: Duration, callback: Task) -> TimerId {
        let deadline = Instant::now()
            .checked_add(delay)
            .map_or(Deadline::Never, Deadline::At);
        let id = {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                drop(state);
                // Dropping the callback is how the caller learns it will never fire.
                drop(callback);
                return TimerId(u64::MAX);
            }
            state.heap.insert(deadline, callback)
        };
        trace!(timer = ?id, delay_ms = delay.as_millis(), "timer scheduled");
        self.shared.condvar.notify_one();
        id
    }

    fn cancel(&self, id: TimerId) -> bool {
        let removed = self.shared.state.lock().heap.cancel(id);
        removed.is_some()
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timer_loop(shared: &TimerShared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        let now = Instant::now();
        let expired = state.heap.pop_expired(now);
        if !expired.is_empty() {
            drop(state);
            for callback in expired {
                run_task(callback);
            }
            state = shared.state.lock();
            continue;
        }
        match state.heap.peek_deadline() {
            Some(Deadline::At(deadline)) => {
                let _ = shared.condvar.wait_until(&mut state, deadline);
            }
            Some(Deadline::Never) | None => shared.condvar.wait(&mut state),
        }
    }
}

/// Manually driven timer for deterministic tests.
///
/// Time starts at zero and moves only through [`advance`](Self::advance).
/// Callbacks run on the thread calling `advance`.
#[derive(Clone)]
pub struct VirtualTimer {
    inner: Arc<Mutex<VirtualState>>,
}

struct VirtualState {
    now: Duration,
    heap: TimerHeap<Duration>,
}

impl Default for VirtualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VirtualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("VirtualTimer")
            .field("now", &state.now)
            .field("pending", &state.heap.len())
            .finish()
    }
}

impl VirtualTimer {
    /// Creates a timer at virtual time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VirtualState {
                now: Duration::ZERO,
                heap: TimerHeap::new(),
            })),
        }
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Returns the number of timers that have not fired.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Moves time forward by `by` and runs every callback now due.
    ///
    /// Returns the number of callbacks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let expired = {
            let mut state = self.inner.lock();
            state.now = state.now.saturating_add(by);
            let now = state.now;
            state.heap.pop_expired(now)
        };
        let fired = expired.len();
        for callback in expired {
            callback();
        }
        fired
    }
}

impl Timer for VirtualTimer {
    fn schedule_once(&self, delay: Duration, callback: Task) -> TimerId {
        let mut state = self.inner.lock();
        let deadline = state
            .now
            .checked_add(delay)
            .map_or(Deadline::Never, Deadline::At);
        state.heap.insert(deadline, callback)
    }

    fn cancel(&self, id: TimerId) -> bool {
        let removed = self.inner.lock().heap.cancel(id);
        removed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::mpsc;

    fn counter_task(counter: &Arc<AtomicUsize>) -> Task {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        })
    }

    #[test]
    fn heap_pops_earliest_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut heap = TimerHeap::new();
        for (deadline, label) in [(100u64, "b"), (50, "a"), (150, "c")] {
            let order = Arc::clone(&order);
            heap.insert(
                Deadline::At(deadline),
                Box::new(move || order.lock().push(label)),
            );
        }
        assert_eq!(heap.peek_deadline(), Some(Deadline::At(50)));

        for callback in heap.pop_expired(100) {
            callback();
        }
        assert_eq!(*order.lock(), vec!["a", "b"]);
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn heap_skips_cancelled_entries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut heap = TimerHeap::new();
        let first = heap.insert(Deadline::At(10u64), counter_task(&counter));
        heap.insert(Deadline::At(20), counter_task(&counter));

        assert!(heap.cancel(first).is_some());
        assert!(heap.cancel(first).is_none());
        assert_eq!(heap.peek_deadline(), Some(Deadline::At(20)));
        assert_eq!(heap.pop_expired(100).len(), 1);
    }

    #[test]
    fn virtual_timer_fires_only_after_deadline() {
        let timer = VirtualTimer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        timer.schedule_once(Duration::from_millis(100), counter_task(&counter));

        assert_eq!(timer.advance(Duration::from_millis(99)), 0);
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);

        assert_eq!(timer.advance(Duration::from_millis(1)), 1);
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 1);

        assert_eq!(timer.advance(Duration::from_secs(1)), 0, "fires once");
        assert_eq!(timer.now(), Duration::from_millis(1100));
    }

    #[test]
    fn virtual_timer_cancel() {
        let timer = VirtualTimer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = timer.schedule_once(Duration::from_millis(5), counter_task(&counter));
        assert!(timer.cancel(id));
        timer.advance(Duration::from_millis(10));
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(timer.pending_count(), 0);
    }

    #[test]
    fn timer_thread_fires_after_delay() {
        let timer = TimerThread::start("test-timer");
        let (tx, rx) = mpsc::channel();
        let started = Instant::now();
        timer.schedule_once(
            Duration::from_millis(30),
            Box::new(move || {
                tx.send((Instant::now(), context::current_role()))
                    .expect("send");
            }),
        );
        let (fired_at, role) = rx.recv_timeout(Duration::from_secs(5)).expect("fired");
        assert!(fired_at.duration_since(started) >= Duration::from_millis(30));
        assert_eq!(role, ThreadRole::Timer);
    }

    #[test]
    fn timer_thread_orders_by_deadline() {
        let timer = TimerThread::start("test-timer");
        let (tx, rx) = mpsc::channel();
        for (delay, label) in [(40u64, "late"), (10, "early")] {
            let tx = tx.clone();
            timer.schedule_once(
                Duration::from_millis(delay),
                Box::new(move || tx.send(label).expect("send")),
            );
        }
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("early"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok("late"));
    }

    #[test]
    fn shutdown_drops_pending_callbacks() {
        let timer = TimerThread::start("test-timer");
        let counter = Arc::new(AtomicUsize::new(0));
        timer.schedule_once(Duration::from_secs(60), counter_task(&counter));
        assert_eq!(timer.pending_count(), 1);
        timer.shutdown();
        assert_eq!(timer.pending_count(), 0);
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn never_deadline_outlasts_any_instant() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut heap = TimerHeap::new();
        heap.insert(Deadline::Never, counter_task(&counter));
        heap.insert(Deadline::At(u64::MAX), counter_task(&counter));
        assert_eq!(heap.pop_expired(u64::MAX).len(), 1);
        assert_eq!(heap.peek_deadline(), Some(Deadline::Never));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn virtual_timer_accepts_unrepresentable_delay() {
        let timer = VirtualTimer::new();
        let counter = Arc::new(AtomicUsize::new(0));
        timer.advance(Duration::from_secs(1));
        timer.schedule_once(Duration::MAX, counter_task(&counter));
        assert_eq!(timer.pending_count(), 1);

        assert_eq!(timer.advance(Duration::from_secs(86_400 * 365)), 0);
        assert_eq!(timer.advance(Duration::MAX), 0, "saturated time never reaches it");
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn timer_thread_accepts_unrepresentable_delay() {
        let timer = TimerThread::start("test-timer");
        let counter = Arc::new(AtomicUsize::new(0));
        timer.schedule_once(Duration::MAX, counter_task(&counter));
        let (tx, rx) = mpsc::channel();
        timer.schedule_once(
            Duration::from_millis(5),
            Box::new(move || tx.send(()).expect("send")),
        );
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok(), "shorter timer still fires");
        assert_eq!(timer.pending_count(), 1);
        timer.shutdown();
        assert_eq!(counter.load(AtomicOrdering::SeqCst), 0);
    }

    /// Re-arms the timer from its own drop, as a broken promise's inline
    /// continuation calling `wait_async` again would.
    struct RearmOnDrop {
        timer: Arc<TimerThread>,
        rearmed: mpsc::Sender<TimerId>,
    }

    impl Drop for RearmOnDrop {
        fn drop(&mut self) {
            let id = self.timer.schedule_once(Duration::from_millis(1), Box::new(|| {}));
            let _ = self.rearmed.send(id);
        }
    }

    #[test]
    fn dropped_callbacks_may_reenter_the_timer() {
        let timer = Arc::new(TimerThread::start("test-timer"));
        let (tx, rx) = mpsc::channel();
        let guard = RearmOnDrop {
            timer: Arc::clone(&timer),
            rearmed: tx,
        };
        timer.schedule_once(
            Duration::from_secs(3600),
            Box::new(move || drop(guard)),
        );

        let stopper = Arc::clone(&timer);
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            stopper.shutdown();
            done_tx.send(()).expect("send");
        });
        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("shutdown returned");
        let rearmed = rx.recv_timeout(Duration::from_secs(5)).expect("guard dropped");
        assert_eq!(rearmed, TimerId(u64::MAX), "rejected after shutdown");
        assert_eq!(timer.pending_count(), 0);
    }
}
