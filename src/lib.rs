//! Expectant: typed, cancellable futures with tri-state results and
//! placement-aware continuations.
//!
//! # Overview
//!
//! A [`Future<T>`] settles exactly once with an [`Expected<T>`]: a value, an
//! [`Error`], or `Cancelled`. Work is composed by chaining continuations and
//! joining or racing futures; nothing in the composition layer blocks a
//! thread waiting on another future.
//!
//! # Core Guarantees
//!
//! - **Exactly-once settlement**: the first write to a [`Promise`] wins;
//!   later writes are ignored, and a promise whose producers all vanish
//!   settles as a broken promise instead of hanging
//! - **Short-circuiting**: value continuations ([`Future::map`],
//!   [`Future::and_then`]) never run on an error or cancellation
//! - **Cooperative cancellation**: a [`CancellationHandle`] skips work that
//!   has not started and discards results that land after it fired; it never
//!   interrupts running code
//! - **Placement**: every body and continuation runs where its
//!   [`ExecutionPolicy`] says, never more than once
//!
//! # Example
//!
//! ```no_run
//! use expectant::{spawn, when_all_values, ExecutionOptions, Expected, FailMode};
//! use std::time::Duration;
//!
//! let parts: Vec<_> = (1..=3)
//!     .map(|n| spawn(move || Expected::Completed(n * 10), ExecutionOptions::thread_pool()))
//!     .collect();
//! let total = when_all_values(&parts, FailMode::Fast).map(|values| values.iter().sum::<i32>());
//! assert_eq!(total.wait_timeout(Duration::from_secs(1)).map(Expected::unwrap), Some(60));
//! ```
//!
//! # Module Structure
//!
//! - [`types`]: [`Expected`], [`CancellationHandle`], [`ExecutionOptions`]
//! - [`error`]: the error payload and its kinds
//! - [`future`]: [`Promise`], [`Future`] and [`spawn`]
//! - [`combinator`]: [`when_all`], [`when_all_values`], [`when_any`], [`wait_async`]
//! - [`runtime`]: the [`Scheduler`](runtime::Scheduler) and
//!   [`Timer`](runtime::Timer) interfaces, the reference [`Runtime`](runtime::Runtime)
//!   and the deterministic [`LabScheduler`](runtime::LabScheduler)
//!
//! # Features
//!
//! - `tracing-integration` (default): structured logging through `tracing`
//! - `config-file`: load runtime configuration from TOML

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod combinator;
pub mod error;
pub mod future;
pub mod runtime;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use combinator::{
    wait_async, when_all, when_all_values, when_all_values_ordered, when_any, Aggregation,
    FailMode,
};
pub use error::{Error, ErrorKind};
pub use future::{spawn, Future, Promise};
pub use runtime::{Executor, Runtime, RuntimeBuilder};
pub use types::{
    CancellationHandle, ContextId, ExecutionOptions, ExecutionPolicy, Expected, Interrupted,
};
