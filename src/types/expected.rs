//! Tri-state result type.
//!
//! An [`Expected`] is the settled value of a [`Future`](crate::future::Future):
//!
//! - `Completed(T)`: success with a value
//! - `Error(Error)`: failure with a code and message
//! - `Cancelled`: the work was skipped or discarded because its
//!   [`CancellationHandle`](super::CancellationHandle) fired
//!
//! `Expected<()>` is the payload-free form.

use crate::error::Error;
use core::fmt;

/// The three-valued outcome of an asynchronous operation.
#[derive(Debug, Clone)]
pub enum Expected<T> {
    /// Success with a value.
    Completed(T),
    /// The operation failed.
    Error(Error),
    /// The operation was cancelled.
    Cancelled,
}

impl<T> Expected<T> {
    /// Returns true if this is `Completed`.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if this is `Error`.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Returns true if this is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns a reference to the value if `Completed`.
    #[must_use]
    pub const fn value(&self) -> Option<&T> {
        match self {
            Self::Completed(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value if `Completed`, dropping any other state.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the error if this is `Error`.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Converts from `&Expected<T>` to `Expected<&T>`.
    #[must_use]
    pub fn as_ref(&self) -> Expected<&T> {
        match self {
            Self::Completed(v) => Expected::Completed(v),
            Self::Error(e) => Expected::Error(e.clone()),
            Self::Cancelled => Expected::Cancelled,
        }
    }

    /// Maps the completed value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Expected<U> {
        match self {
            Self::Completed(v) => Expected::Completed(f(v)),
            Self::Error(e) => Expected::Error(e),
            Self::Cancelled => Expected::Cancelled,
        }
    }

    /// Changes the payload type, replacing a completed value with `substitute`.
    ///
    /// `Error` and `Cancelled` are carried over verbatim.
    pub fn convert<U>(self, substitute: U) -> Expected<U> {
        match self {
            Self::Completed(_) => Expected::Completed(substitute),
            Self::Error(e) => Expected::Error(e),
            Self::Cancelled => Expected::Cancelled,
        }
    }

    /// Re-tags a non-completed state to another payload type.
    ///
    /// Returns `None` for `Completed`, which has no value of type `U` to carry.
    pub fn forward<U>(&self) -> Option<Expected<U>> {
        match self {
            Self::Completed(_) => None,
            Self::Error(e) => Some(Expected::Error(e.clone())),
            Self::Cancelled => Some(Expected::Cancelled),
        }
    }

    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, Interrupted> {
        match self {
            Self::Completed(v) => Ok(v),
            Self::Error(e) => Err(Interrupted::Error(e)),
            Self::Cancelled => Err(Interrupted::Cancelled),
        }
    }

    /// Returns the completed value or panics.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is not `Completed`.
    #[track_caller]
    pub fn unwrap(self) -> T {
        match self {
            Self::Completed(v) => v,
            Self::Error(e) => panic!("called `Expected::unwrap()` on an `Error` value: {e}"),
            Self::Cancelled => panic!("called `Expected::unwrap()` on a `Cancelled` value"),
        }
    }

    /// Returns the completed value or a default.
    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Self::Completed(v) => v,
            _ => default,
        }
    }
}

impl<T> From<Result<T, Error>> for Expected<T> {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(v) => Self::Completed(v),
            Err(e) => Self::Error(e),
        }
    }
}

/// The non-success half of an [`Expected`], produced by [`Expected::into_result`].
#[derive(Debug, Clone)]
pub enum Interrupted {
    /// The operation failed.
    Error(Error),
    /// The operation was cancelled.
    Cancelled,
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for Interrupted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Error(e) => Some(e),
            Self::Cancelled => None,
        }
    }
}
