//! Asynchronous control-flow combinators built on plain futures.
//!
//! `asyncflow` provides a small set of primitives for composing asynchronous
//! work in order, in loops, and across calling conventions. Every combinator
//! is an ordinary `Future`; none of them spawns tasks or depends on a
//! particular runtime, so they run on whatever executor polls them.
//!
//! Features include:
//! - [`series`] / [`series_with`] for running work items one after another,
//!   each receiving the previous result, stopping at the first error
//! - [`whilst`] for repeating an action while a condition holds
//! - [`safely_promisify`] for turning callback-style, future-returning and
//!   nodeified functions into one future-returning shape, optionally catching
//!   errors raised outside the future chain through a [`CaptureScope`]
//! - [`invoke_all`] for starting many futures at once and joining them
//! - [`FlowExt`] adding `series`, `nodeify` and `spread_nodeify` to any future
//!
//! Errors raised by user code pass through every combinator unchanged.
//! Combinators that can fail on their own report a [`FlowError`] converted
//! into the caller's error type.

pub mod capture;
pub mod error;
pub mod flow_ext;
pub mod invoke;
pub mod nodeify;
pub mod outcome;
pub mod promisify;
pub mod series;
pub mod whilst;

pub use capture::{CaptureScope, ErrorSink};
pub use error::{FlowError, Panicked};
pub use flow_ext::FlowExt;
pub use invoke::invoke_all;
pub use nodeify::Spread;
pub use outcome::{Outcome, Returned, Step};
pub use promisify::{Completion, Invocation, Promisify, PromisifyFuture, safely_promisify};
pub use series::{series, series_with};
pub use whilst::whilst;
