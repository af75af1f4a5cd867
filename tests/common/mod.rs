#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use expectant::{Expected, Future, Runtime, RuntimeBuilder};
use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

/// Upper bound for any single wait in the integration suite.
pub const WAIT: Duration = Duration::from_secs(5);

const PROPTEST_SEED_ENV: &str = "EXPECTANT_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    std::env::var("CI").ok().map(|_| DEFAULT_PROPTEST_SEED)
}

/// Initialize test logging with trace-level output.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
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

/// Build a small dedicated runtime with the given named contexts.
#[must_use]
pub fn test_runtime(contexts: &[&str]) -> Runtime {
    init_test_logging();
    let builder = contexts.iter().fold(
        RuntimeBuilder::new()
            .min_threads(1)
            .max_threads(4)
            .thread_name_prefix("expectant-test"),
        |builder, id| builder.named_context(*id),
    );
    builder.build().expect("failed to build test runtime")
}

/// Block until `future` settles, failing the test after [`WAIT`].
pub fn settle<T: Clone + Send + 'static>(future: &Future<T>, description: &str) -> Expected<T> {
    match future.wait_timeout(WAIT) {
        Some(outcome) => {
            tracing::debug!(description = %description, "future settled");
            outcome
        }
        None => panic!("future '{description}' did not settle within {WAIT:?}"),
    }
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully");
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}
