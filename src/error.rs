//! Error types carried by an [`Expected`](crate::types::Expected).
//!
//! Every failure that flows through a future is an [`Error`]: a closed
//! [`ErrorKind`] plus a numeric code and an optional message. Errors are
//! values, never control flow; they are settled into promises and observed
//! by continuations.
//!
//! # Codes
//!
//! Each kind has a default code (see [`ErrorKind::code`]). Application errors
//! use [`ErrorKind::User`] and may carry any code via [`Error::with_code`].

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A combinator or constructor was handed an argument it cannot work with.
    InvalidArgument,
    /// Every producer of a promise was dropped before settling it.
    BrokenPromise,
    /// User code panicked while running a body or continuation.
    Panicked,
    /// Internal invariant violated (bug).
    Internal,
    /// Application-defined error.
    User,
}

impl ErrorKind {
    /// Returns the default numeric code for this kind.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::InvalidArgument => 22,
            Self::BrokenPromise => 32,
            Self::Panicked => 70,
            Self::Internal => 71,
            Self::User => 1,
        }
    }

    /// Returns true if the failure originated in the library rather than in user code.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::BrokenPromise | Self::Internal)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::BrokenPromise => write!(f, "broken promise"),
            Self::Panicked => write!(f, "panicked"),
            Self::Internal => write!(f, "internal error"),
            Self::User => write!(f, "error"),
        }
    }
}

/// The error payload of [`Expected::Error`](crate::types::Expected::Error).
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    code: i32,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind and its default code.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: None,
            source: None,
        }
    }

    /// Creates an application error with an explicit code and message.
    #[must_use]
    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::User,
            code,
            message: Some(message.into()),
            source: None,
        }
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates the error a promise settles with when all of its producers are gone.
    #[must_use]
    pub fn broken_promise() -> Self {
        Self::new(ErrorKind::BrokenPromise)
            .with_message("promise dropped before a value was set")
    }

    /// Creates an error from a caught panic payload.
    #[must_use]
    pub fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// Creates an internal error (library bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the numeric error code.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.kind, self.code)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A specialized Result type for fallible conversions out of an `Expected`.
pub type Result<T> = core::result::Result<T, Error>;
