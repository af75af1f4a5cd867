//! Execution placement policy and per-call options.
//!
//! [`ExecutionOptions`] travel by value to every `spawn` and `then*` call and
//! decide *where* a body or continuation runs, plus an optional
//! [`CancellationHandle`] that decides *whether* it runs at all.

use super::cancel::CancellationHandle;
use core::fmt;
use std::sync::Arc;

/// Identifier of a named execution context (a dedicated thread in the
/// reference runtime).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Arc<str>);

impl ContextId {
    /// Creates a context identifier.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the context name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Where a unit of work runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ExecutionPolicy {
    /// Run synchronously on the thread that settled the predecessor.
    Inline,
    /// Run on the thread that issued the call, captured at call time.
    #[default]
    Current,
    /// Run on a specific named context.
    NamedThread(ContextId),
    /// Run on any worker of the general pool.
    ThreadPool,
}

impl ExecutionPolicy {
    /// Returns true for [`ExecutionPolicy::Inline`].
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self, Self::Inline)
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Current => write!(f, "current"),
            Self::NamedThread(id) => write!(f, "named({id})"),
            Self::ThreadPool => write!(f, "thread-pool"),
        }
    }
}

/// Options for a single `spawn` or `then*` call.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    policy: ExecutionPolicy,
    cancellation: Option<CancellationHandle>,
}

impl ExecutionOptions {
    /// Creates options with the given policy and no cancellation.
    #[must_use]
    pub const fn new(policy: ExecutionPolicy) -> Self {
        Self {
            policy,
            cancellation: None,
        }
    }

    /// Returns a builder.
    #[must_use]
    pub fn builder() -> ExecutionOptionsBuilder {
        ExecutionOptionsBuilder::default()
    }

    /// Options running inline on the settling thread.
    #[must_use]
    pub const fn inline() -> Self {
        Self::new(ExecutionPolicy::Inline)
    }

    /// Options running on the calling thread's context.
    #[must_use]
    pub const fn current() -> Self {
        Self::new(ExecutionPolicy::Current)
    }

    /// Options running on the general pool.
    #[must_use]
    pub const fn thread_pool() -> Self {
        Self::new(ExecutionPolicy::ThreadPool)
    }

    /// Options running on the named context `id`.
    #[must_use]
    pub fn named(id: impl Into<ContextId>) -> Self {
        Self::new(ExecutionPolicy::NamedThread(id.into()))
    }

    /// Default policy, gated on `handle`.
    #[must_use]
    pub fn with_cancellation(handle: CancellationHandle) -> Self {
        Self {
            policy: ExecutionPolicy::default(),
            cancellation: Some(handle),
        }
    }

    /// Returns the execution policy.
    #[must_use]
    pub const fn policy(&self) -> &ExecutionPolicy {
        &self.policy
    }

    /// Returns the cancellation handle, if any.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationHandle> {
        self.cancellation.as_ref()
    }

    /// Returns true if a cancellation handle is attached and has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationHandle::is_cancelled)
    }

    pub(crate) fn into_parts(self) -> (ExecutionPolicy, Option<CancellationHandle>) {
        (self.policy, self.cancellation)
    }
}

impl From<ExecutionPolicy> for ExecutionOptions {
    fn from(policy: ExecutionPolicy) -> Self {
        Self::new(policy)
    }
}

/// Builder for [`ExecutionOptions`].
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptionsBuilder {
    policy: ExecutionPolicy,
    cancellation: Option<CancellationHandle>,
}

impl ExecutionOptionsBuilder {
    /// Sets the execution policy.
    #[must_use]
    pub fn policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Targets a named context. Implies [`ExecutionPolicy::NamedThread`].
    #[must_use]
    pub fn named_thread(mut self, id: impl Into<ContextId>) -> Self {
        self.policy = ExecutionPolicy::NamedThread(id.into());
        self
    }

    /// Attaches a cancellation handle.
    #[must_use]
    pub fn cancellation(mut self, handle: CancellationHandle) -> Self {
        self.cancellation = Some(handle);
        self
    }

    /// Builds the options.
    #[must_use]
    pub fn build(self) -> ExecutionOptions {
        ExecutionOptions {
            policy: self.policy,
            cancellation: self.cancellation,
        }
    }
}
