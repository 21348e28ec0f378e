//! Errors originated by the combinators themselves.
//!
//! Errors produced by user code (a failing step, action or wrapped function)
//! are never wrapped: they travel through every combinator as the caller's own
//! error type `E`. Combinators that can fail on their own require
//! `E: From<FlowError>` so that these errors land in the same channel.

use std::any::Any;

use thiserror::Error;

/// Failures detected by a combinator rather than by the work it runs.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FlowError {
    /// A thunk handed to [`invoke_all`](crate::invoke_all) returned a plain
    /// value instead of a future.
    #[error("thunk at index {index} did not return a future")]
    ProtocolViolation { index: usize },

    /// A resolved value did not have the shape a callback expected.
    #[error("{0}")]
    TypeMismatch(&'static str),

    /// A wrapped function dropped its completion callback without calling it,
    /// returned no future and left no error sink alive.
    #[error("wrapped function dropped its completion callback without settling")]
    Abandoned,
}

/// A panic caught by [`ErrorSink::guard_unwind`](crate::capture::ErrorSink::guard_unwind).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("captured panic: {message}")]
pub struct Panicked {
    pub message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_string(),
            Err(payload) => match payload.downcast::<String>() {
                Ok(s) => *s,
                Err(_) => "Box<dyn Any>".to_string(),
            },
        };
        Self { message }
    }
}
