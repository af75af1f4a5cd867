//! Core types: the tri-state result, cancellation and execution options.

pub mod cancel;
pub mod expected;
pub mod options;

pub use cancel::CancellationHandle;
pub use expected::{Expected, Interrupted};
pub use options::{ContextId, ExecutionOptions, ExecutionOptionsBuilder, ExecutionPolicy};
