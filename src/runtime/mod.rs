//! Scheduling interfaces and the reference runtime.
//!
//! The composition layer only ever talks to two interfaces:
//!
//! - [`Scheduler`]: places a [`Task`] according to an
//!   [`ExecutionPolicy`](crate::types::ExecutionPolicy)
//! - [`Timer`]: runs a task once after a delay
//!
//! bundled together as an [`Executor`]. Everything else in this module is an
//! implementation of those interfaces:
//!
//! - [`Runtime`]: elastic [`WorkerPool`], one thread per named context
//!   ([`NamedContexts`]) and a [`TimerThread`]
//! - [`LabScheduler`] and [`VirtualTimer`]: deterministic, test-driven
//! - [`InlineScheduler`]: runs everything on the caller
//!
//! # Runtime Builder
//!
//! ```ignore
//! use expectant::runtime::RuntimeBuilder;
//!
//! let runtime = RuntimeBuilder::new()
//!     .max_threads(4)
//!     .named_context("coordinator")
//!     .build()?;
//! let executor = runtime.executor();
//! ```
//!
//! ## Config File + Environment Overrides
//!
//! ```ignore
//! use expectant::runtime::RuntimeBuilder;
//!
//! // Requires the `config-file` feature.
//! let runtime = RuntimeBuilder::from_toml("config/expectant.toml")?
//!     .with_env_overrides()?
//!     .build()?;
//! ```
//!
//! # Error Handling
//!
//! Configuration problems surface as [`ConfigError`] from
//! [`RuntimeBuilder::build`] and the loaders. The global runtime behind
//! [`Executor::global`] never fails to start: invalid environment values are
//! logged and ignored.

pub mod builder;
pub mod config;
pub mod context;
pub mod env_config;
pub mod executor;
pub mod lab;
pub mod named;
pub mod pool;
pub mod scheduler;
pub mod timer;

pub use builder::{ConfigError, Runtime, RuntimeBuilder};
pub use config::RuntimeConfig;
pub use context::{current_context, current_role, ThreadRole};
pub use executor::{global_runtime, Executor};
pub use lab::LabScheduler;
pub use named::NamedContexts;
pub use pool::{WorkerPool, WorkerPoolOptions};
pub use scheduler::{InlineScheduler, Scheduler, Task};
pub use timer::{Timer, TimerId, TimerThread, VirtualTimer};
