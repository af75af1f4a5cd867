//! Property-based tests for promise settlement and join aggregation.
//!
//! # Settlement
//! - Only the first write is observed, whatever follows
//! - A continuation runs exactly once per settlement
//!
//! # Join
//! - Input order is independent of completion order
//! - Completion order reflects the order inputs were settled

#[macro_use]
mod common;

use common::*;
use expectant::runtime::{InlineScheduler, VirtualTimer};
use expectant::{
    when_all_values, when_all_values_ordered, Aggregation, Error, Executor, Expected, FailMode,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn inline_executor() -> Executor {
    Executor::new(Arc::new(InlineScheduler), Arc::new(VirtualTimer::new()))
}

#[derive(Debug, Clone)]
enum Write {
    Value(i32),
    Fail(i32),
    Cancel,
}

fn arb_write() -> impl Strategy<Value = Write> {
    prop_oneof![
        any::<i32>().prop_map(Write::Value),
        any::<i32>().prop_map(Write::Fail),
        Just(Write::Cancel),
    ]
}

fn as_expected(write: &Write) -> Expected<i32> {
    match write {
        Write::Value(v) => Expected::Completed(*v),
        Write::Fail(code) => Expected::Error(Error::with_code(*code, "property")),
        Write::Cancel => Expected::Cancelled,
    }
}

fn matches(outcome: &Expected<i32>, write: &Write) -> bool {
    match (outcome, write) {
        (Expected::Completed(a), Write::Value(b)) => a == b,
        (Expected::Error(e), Write::Fail(code)) => e.code() == *code,
        (Expected::Cancelled, Write::Cancel) => true,
        _ => false,
    }
}

/// A permutation of `0..n`.
fn arb_permutation(max: usize) -> impl Strategy<Value = Vec<usize>> {
    (1..=max).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(test_proptest_config(128))]

    #[test]
    fn first_write_wins(writes in proptest::collection::vec(arb_write(), 1..8)) {
        init_test_logging_with_level(tracing::Level::WARN);
        let promise = inline_executor().promise::<i32>();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let _ = promise.future().then(move |outcome| {
            counter.fetch_add(1, Ordering::SeqCst);
            outcome
        });

        for (index, write) in writes.iter().enumerate() {
            prop_assert_eq!(promise.set_value(as_expected(write)), index == 0);
        }
        let outcome = promise.future().try_get().expect("settled");
        prop_assert!(matches(&outcome, &writes[0]), "observed {:?}", outcome);
        prop_assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn join_values_follow_input_order(order in arb_permutation(10)) {
        let executor = inline_executor();
        let promises: Vec<_> = order.iter().map(|_| executor.promise::<usize>()).collect();
        let futures: Vec<_> = promises.iter().map(expectant::Promise::future).collect();
        let joined = when_all_values(&futures, FailMode::Full);

        for &index in &order {
            prop_assert!(!joined.is_ready());
            promises[index].complete(index);
        }
        let values = joined.try_get().expect("settled").unwrap();
        prop_assert_eq!(values, (0..order.len()).collect::<Vec<_>>());
    }

    #[test]
    fn join_values_follow_completion_order(order in arb_permutation(10)) {
        let executor = inline_executor();
        let promises: Vec<_> = order.iter().map(|_| executor.promise::<usize>()).collect();
        let futures: Vec<_> = promises.iter().map(expectant::Promise::future).collect();
        let joined =
            when_all_values_ordered(&futures, FailMode::Fast, Aggregation::CompletionOrder);

        for &index in &order {
            promises[index].complete(index);
        }
        prop_assert_eq!(joined.try_get().expect("settled").unwrap(), order);
    }

    #[test]
    fn join_reports_first_failure(order in arb_permutation(6), failing in 0usize..6) {
        let failing = failing % order.len();
        let executor = inline_executor();
        let promises: Vec<_> = order.iter().map(|_| executor.promise::<usize>()).collect();
        let futures: Vec<_> = promises.iter().map(expectant::Promise::future).collect();
        let joined = when_all_values(&futures, FailMode::Full);

        // Every input after the designated one also fails; only the first is reported.
        let position = order.iter().position(|&i| i == failing).expect("in permutation");
        for (step, &index) in order.iter().enumerate() {
            if step >= position {
                let code = i32::try_from(index).expect("small index");
                promises[index].fail(Error::with_code(code, "join failure"));
            } else {
                promises[index].complete(index);
            }
        }
        let outcome = joined.try_get().expect("settled");
        prop_assert_eq!(
            outcome.error().map(Error::code),
            Some(i32::try_from(failing).expect("small index"))
        );
    }
}
