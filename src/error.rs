//! Public error type for the engine.
//!
//! Every fallible engine call returns a [`CaracalError`]: a status kind
//! drawn from a fixed taxonomy plus an ordered stack of cause messages,
//! outermost first. Internal modules use their own `thiserror` enums and
//! are converted into this type at the session boundary, each layer
//! contributing one entry to the stack.

use std::fmt;

/// Status taxonomy for engine failures.
///
/// Kinds are distinguished so callers can apply different retry policy:
/// `ActivationThrottled` is retryable after backoff, `ActivationLimitReached`
/// and `ActivationRefused` are terminal, and everything else is
/// non-retryable without changing inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: wrong frame length, empty access key,
    /// non-positive endpoint duration.
    InvalidArgument,
    /// Missing or unreadable model file.
    Io,
    /// Allocation failure inside the engine.
    OutOfMemory,
    /// Method invoked on a session in an invalid lifecycle phase
    /// (e.g. after `delete`).
    InvalidState,
    /// Internal engine failure; the session should be deleted and recreated.
    Runtime,
    /// Generic authorization failure.
    Activation,
    /// Access key usage limit reached; do not retry.
    ActivationLimitReached,
    /// Authorization temporarily throttled; retry later.
    ActivationThrottled,
    /// Access key rejected as invalid; do not retry.
    ActivationRefused,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::OutOfMemory => "OUT_OF_MEMORY",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::Runtime => "RUNTIME_ERROR",
            ErrorKind::Activation => "ACTIVATION_ERROR",
            ErrorKind::ActivationLimitReached => "ACTIVATION_LIMIT_REACHED",
            ErrorKind::ActivationThrottled => "ACTIVATION_THROTTLED",
            ErrorKind::ActivationRefused => "ACTIVATION_REFUSED",
        };
        f.write_str(name)
    }
}

/// Engine error: a status kind, a top-level message, and an ordered stack
/// of cause messages (outermost cause first).
///
/// The stack is owned by the error value; there is no separate release
/// step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaracalError {
    kind: ErrorKind,
    message: String,
    message_stack: Vec<String>,
}

impl CaracalError {
    /// Creates an error with an empty message stack.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            message_stack: Vec::new(),
        }
    }

    /// Creates an error with an explicit cause stack, outermost first.
    pub fn with_stack(
        kind: ErrorKind,
        message: impl Into<String>,
        message_stack: Vec<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            message_stack,
        }
    }

    /// Appends a cause to the end of the stack (innermost position).
    pub fn push_cause(mut self, cause: impl Into<String>) -> Self {
        self.message_stack.push(cause.into());
        self
    }

    /// The status kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The top-level message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The ordered cause stack, outermost first. May be empty.
    pub fn message_stack(&self) -> &[String] {
        &self.message_stack
    }
}

impl fmt::Display for CaracalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for (i, cause) in self.message_stack.iter().enumerate() {
            write!(f, "\n  [{}] {}", i, cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for CaracalError {}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, CaracalError>;
