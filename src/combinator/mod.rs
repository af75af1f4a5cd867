//! Combinators over collections of futures.
//!
//! - [`when_all`] / [`when_all_values`]: wait for every input (see [`FailMode`])
//! - [`when_any`]: the first input to settle wins
//! - [`wait_async`]: a future that completes after a delay

pub mod delay;
pub mod join;
pub mod race;

pub use delay::wait_async;
pub use join::{when_all, when_all_values, when_all_values_ordered, Aggregation, FailMode};
pub use race::when_any;
