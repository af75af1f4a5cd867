//! Runtime builder and the owning [`Runtime`] handle.

use super::config::RuntimeConfig;
use super::env_config;
use super::executor::Executor;
use super::named::NamedContexts;
use super::pool::WorkerPool;
use super::scheduler::{Scheduler, Task};
use super::timer::{Timer, TimerId, TimerThread};
use crate::tracing_compat::{debug, info};
use crate::types::{ContextId, ExecutionPolicy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Errors raised while assembling a runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set to an unparseable value.
    #[error("invalid value for {var}: {reason}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
        /// What was expected.
        reason: String,
    },
    /// The configuration is self-contradictory or unusable.
    #[error("invalid runtime configuration: {0}")]
    Invalid(String),
    /// A config file could not be read.
    #[cfg(feature = "config-file")]
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// Path that was read.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A config file is not valid TOML for this schema.
    #[cfg(feature = "config-file")]
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Values set through builder methods; applied last.
#[derive(Clone, Default)]
struct Explicit {
    min_threads: Option<usize>,
    max_threads: Option<usize>,
    idle_timeout: Option<Duration>,
    thread_name_prefix: Option<String>,
    named_contexts: Vec<ContextId>,
    on_thread_start: Option<Arc<dyn Fn() + Send + Sync>>,
    on_thread_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

/// Builder for constructing a runtime with custom configuration.
///
/// Builder methods win over environment variables, which win over a config
/// file, which wins over defaults, whatever order the calls are made in.
///
/// ```no_run
/// use expectant::runtime::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new()
///     .with_env_overrides()?
///     .max_threads(4)
///     .named_context("coordinator")
///     .build()?;
/// let executor = runtime.executor();
/// # Ok::<(), expectant::runtime::ConfigError>(())
/// ```
#[derive(Clone, Default)]
pub struct RuntimeBuilder {
    base: RuntimeConfig,
    explicit: Explicit,
}

impl RuntimeBuilder {
    /// Create a new builder with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a TOML config file.
    #[cfg(feature = "config-file")]
    pub fn from_toml(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let parsed = env_config::parse_toml_file(path.as_ref())?;
        let mut builder = Self::new();
        env_config::apply_toml_config(&mut builder.base, &parsed);
        Ok(builder)
    }

    /// Start from TOML text.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let parsed = env_config::parse_toml_str(toml)?;
        let mut builder = Self::new();
        env_config::apply_toml_config(&mut builder.base, &parsed);
        Ok(builder)
    }

    /// Apply `EXPECTANT_*` environment variables on top of the file/defaults.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        env_config::apply_env_overrides(&mut self.base)?;
        Ok(self)
    }

    /// Set the number of workers kept alive when idle.
    #[must_use]
    pub fn min_threads(mut self, n: usize) -> Self {
        self.explicit.min_threads = Some(n);
        self
    }

    /// Set the maximum number of pool workers.
    #[must_use]
    pub fn max_threads(mut self, n: usize) -> Self {
        self.explicit.max_threads = Some(n);
        self
    }

    /// Set how long excess workers may idle before exiting.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.explicit.idle_timeout = Some(timeout);
        self
    }

    /// Set the name prefix for runtime threads.
    #[must_use]
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.explicit.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Start a named context thread at build time.
    #[must_use]
    pub fn named_context(mut self, id: impl Into<ContextId>) -> Self {
        self.explicit.named_contexts.push(id.into());
        self
    }

    /// Register a callback to run when a worker thread starts.
    #[must_use]
    pub fn on_thread_start<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.explicit.on_thread_start = Some(Arc::new(f));
        self
    }

    /// Register a callback to run when a worker thread stops.
    #[must_use]
    pub fn on_thread_stop<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.explicit.on_thread_stop = Some(Arc::new(f));
        self
    }

    /// Returns the configuration `build` would use.
    #[must_use]
    pub fn resolved_config(&self) -> RuntimeConfig {
        let mut config = self.base.clone();
        let explicit = self.explicit.clone();
        if let Some(v) = explicit.min_threads {
            config.min_threads = v;
        }
        if let Some(v) = explicit.max_threads {
            config.max_threads = v;
        }
        if let Some(v) = explicit.idle_timeout {
            config.idle_timeout = v;
        }
        if let Some(v) = explicit.thread_name_prefix {
            config.thread_name_prefix = v;
        }
        config.named_contexts.extend(explicit.named_contexts);
        if explicit.on_thread_start.is_some() {
            config.on_thread_start = explicit.on_thread_start;
        }
        if explicit.on_thread_stop.is_some() {
            config.on_thread_stop = explicit.on_thread_stop;
        }
        config.normalize();
        config
    }

    /// Build a runtime from this configuration.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        Runtime::with_config(self.resolved_config())
    }
}

impl fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("config", &self.resolved_config())
            .finish()
    }
}

/// The reference runtime: an elastic worker pool, one thread per named
/// context and a timer thread.
///
/// Dropping the runtime stops it. Queued pool and context tasks drain first;
/// pending timers are discarded, which settles their futures as broken
/// promises.
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    pool: WorkerPool,
    contexts: NamedContexts,
    timer: TimerThread,
}

impl Runtime {
    /// Create a runtime from an explicit configuration.
    pub fn with_config(mut config: RuntimeConfig) -> Result<Self, ConfigError> {
        config.normalize();
        if config.named_contexts.iter().any(|id| id.name().is_empty()) {
            return Err(ConfigError::Invalid(
                "named context ids must not be empty".to_string(),
            ));
        }
        Ok(Self::start(config))
    }

    /// Starts the threads for an already validated configuration.
    pub(crate) fn start(config: RuntimeConfig) -> Self {
        let pool = WorkerPool::with_options(
            config.min_threads,
            config.max_threads,
            config.pool_options(),
        );
        let contexts = NamedContexts::new(config.thread_name_prefix.clone());
        for id in &config.named_contexts {
            contexts.ensure(id);
        }
        let timer = TimerThread::start(format!("{}-timer", config.thread_name_prefix));

        info!(
            min_threads = config.min_threads,
            max_threads = config.max_threads,
            named_contexts = config.named_contexts.len(),
            "runtime started"
        );
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                pool,
                contexts,
                timer,
            }),
        }
    }

    /// Returns an executor dispatching onto this runtime.
    ///
    /// Executors keep the runtime's threads reachable but do not keep it
    /// running: once the `Runtime` is dropped, further dispatches are dropped.
    #[must_use]
    pub fn executor(&self) -> Executor {
        Executor::new(
            Arc::clone(&self.inner) as Arc<dyn Scheduler>,
            Arc::clone(&self.inner) as Arc<dyn Timer>,
        )
    }

    /// Returns the configuration this runtime was built with.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Returns the worker pool.
    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    /// Returns the named context registry.
    #[must_use]
    pub fn contexts(&self) -> &NamedContexts {
        &self.inner.contexts
    }

    /// Stops timers, drains context threads, then drains the pool.
    ///
    /// Returns `true` if the pool drained within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.timer.shutdown();
        self.inner.contexts.shutdown();
        let drained = self.inner.pool.shutdown_and_wait(timeout);
        debug!(drained, "runtime stopped");
        drained
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let _ = self.shutdown(Duration::from_secs(5));
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("pool", &self.inner.pool)
            .field("contexts", &self.inner.contexts)
            .finish()
    }
}

impl Scheduler for RuntimeInner {
    fn schedule_on(&self, policy: &ExecutionPolicy, task: Task) {
        match policy {
            ExecutionPolicy::Inline => task(),
            ExecutionPolicy::Current => {
                let captured = self.capture_current();
                self.schedule_on(&captured, task);
            }
            ExecutionPolicy::NamedThread(id) => {
                let _ = self.contexts.execute(id, task);
            }
            ExecutionPolicy::ThreadPool => {
                let _ = self.pool.execute(task);
            }
        }
    }
}

impl Timer for RuntimeInner {
    fn schedule_once(&self, delay: Duration, callback: Task) -> TimerId {
        self.timer.schedule_once(delay, callback)
    }

    fn cancel(&self, id: TimerId) -> bool {
        self.timer.cancel(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context;
    use std::sync::mpsc;

    #[test]
    fn programmatic_values_win() {
        let config = RuntimeBuilder::new()
            .min_threads(2)
            .max_threads(3)
            .thread_name_prefix("app")
            .named_context("render")
            .resolved_config();
        assert_eq!(config.min_threads, 2);
        assert_eq!(config.max_threads, 3);
        assert_eq!(config.thread_name_prefix, "app");
        assert_eq!(config.named_contexts, vec![ContextId::new("render")]);
    }

    #[test]
    fn programmatic_beats_env_regardless_of_order() {
        let _guard = crate::test_utils::env_lock();
        std::env::set_var(env_config::ENV_POOL_MAX_THREADS, "7");
        let builder = RuntimeBuilder::new().max_threads(2).with_env_overrides();
        std::env::remove_var(env_config::ENV_POOL_MAX_THREADS);
        let config = builder.unwrap().resolved_config();
        assert_eq!(config.max_threads, 2);
    }

    #[test]
    fn rejects_empty_context_id() {
        let err = RuntimeBuilder::new().named_context("").build().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn dispatches_to_named_context() {
        let runtime = RuntimeBuilder::new()
            .max_threads(2)
            .named_context("coordinator")
            .build()
            .unwrap();
        assert_eq!(runtime.contexts().ids(), vec![ContextId::new("coordinator")]);

        let (tx, rx) = mpsc::channel();
        let executor = runtime.executor();
        executor.scheduler().schedule_on(
            &ExecutionPolicy::NamedThread(ContextId::new("coordinator")),
            Box::new(move || tx.send(context::current_context()).expect("send")),
        );
        let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, Some(ContextId::new("coordinator")));
    }

    #[test]
    fn current_from_named_context_stays_there() {
        let runtime = RuntimeBuilder::new().max_threads(2).build().unwrap();
        let executor = runtime.executor();
        let inner = executor.clone();
        let (tx, rx) = mpsc::channel();
        executor.scheduler().schedule_on(
            &ExecutionPolicy::NamedThread(ContextId::new("logic")),
            Box::new(move || {
                let captured = inner.scheduler().capture_current();
                inner.scheduler().schedule_on(
                    &captured,
                    Box::new(move || tx.send(context::current_context()).expect("send")),
                );
            }),
        );
        let seen = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(seen, Some(ContextId::new("logic")));
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn builds_from_toml_text() {
        let builder = RuntimeBuilder::from_toml_str(
            "[pool]\nmax_threads = 2\n[contexts]\nnamed = [\"io\"]\n",
        )
        .unwrap();
        let config = builder.resolved_config();
        assert_eq!(config.max_threads, 2);
        assert_eq!(config.named_contexts, vec![ContextId::new("io")]);
    }
}
