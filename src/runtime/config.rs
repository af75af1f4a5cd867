//! Runtime configuration types.
//!
//! These types hold the concrete values that drive the reference runtime. In
//! most cases you should use [`RuntimeBuilder`](super::builder::RuntimeBuilder)
//! rather than creating a [`RuntimeConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `min_threads` | 1 |
//! | `max_threads` | available CPU parallelism |
//! | `idle_timeout` | 10 s |
//! | `thread_name_prefix` | `"expectant"` |
//! | `named_contexts` | none |

use super::pool::{WorkerPoolOptions, DEFAULT_IDLE_TIMEOUT};
use crate::types::ContextId;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default prefix for every thread the runtime spawns.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "expectant";

/// Runtime configuration.
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Workers kept alive even when idle.
    pub min_threads: usize,
    /// Upper bound on pool workers (default: available parallelism).
    pub max_threads: usize,
    /// How long a worker above `min_threads` may sit idle before exiting.
    pub idle_timeout: Duration,
    /// Name prefix for pool, context and timer threads.
    pub thread_name_prefix: String,
    /// Named contexts whose threads are started eagerly at build time.
    ///
    /// Contexts not listed here are still started on first use.
    pub named_contexts: Vec<ContextId>,
    /// Callback executed when a pool worker starts.
    pub on_thread_start: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Callback executed when a pool worker stops.
    pub on_thread_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl RuntimeConfig {
    /// Normalize configuration values to safe defaults.
    pub fn normalize(&mut self) {
        if self.max_threads == 0 {
            self.max_threads = 1;
        }
        if self.max_threads < self.min_threads {
            self.max_threads = self.min_threads;
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = DEFAULT_THREAD_NAME_PREFIX.to_string();
        }
        self.named_contexts.sort();
        self.named_contexts.dedup();
    }

    pub(crate) fn default_max_threads() -> usize {
        std::thread::available_parallelism()
            .map_or(1, std::num::NonZeroUsize::get)
            .max(1)
    }

    pub(crate) fn pool_options(&self) -> WorkerPoolOptions {
        WorkerPoolOptions {
            idle_timeout: self.idle_timeout,
            thread_name_prefix: self.thread_name_prefix.clone(),
            on_thread_start: self.on_thread_start.clone(),
            on_thread_stop: self.on_thread_stop.clone(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            min_threads: 1,
            max_threads: Self::default_max_threads(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            named_contexts: Vec::new(),
            on_thread_start: None,
            on_thread_stop: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("min_threads", &self.min_threads)
            .field("max_threads", &self.max_threads)
            .field("idle_timeout", &self.idle_timeout)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("named_contexts", &self.named_contexts)
            .field("on_thread_start", &self.on_thread_start.is_some())
            .field("on_thread_stop", &self.on_thread_stop.is_some())
            .finish()
    }
}
