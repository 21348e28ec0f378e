//! Tagged unions describing what user code hands back to a combinator.
//!
//! Combinators never inspect types at runtime. A step, an action or a wrapped
//! function says explicitly whether it finished synchronously, produced a
//! future, or (for wrapped functions) reports through a callback, and the
//! combinator branches on that tag.

use futures::future::{BoxFuture, FutureExt};

/// The result of running one unit of work: either already known or still
/// pending behind a future.
///
/// `Ready(Err(_))` plays the role of a synchronous throw and is treated
/// exactly like a rejected future.
#[must_use]
pub enum Outcome<'a, T, E> {
    Ready(Result<T, E>),
    Pending(BoxFuture<'a, Result<T, E>>),
}

impl<'a, T, E> Outcome<'a, T, E> {
    pub fn ok(value: T) -> Self {
        Outcome::Ready(Ok(value))
    }

    pub fn err(error: E) -> Self {
        Outcome::Ready(Err(error))
    }

    /// Wraps a future that resolves to a `Result`.
    pub fn future(future: impl Future<Output = Result<T, E>> + Send + 'a) -> Self {
        Outcome::Pending(future.boxed())
    }

    /// Returns `true` if the outcome carries a future.
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    /// Converts the outcome into a future regardless of its tag.
    pub fn into_future(self) -> BoxFuture<'a, Result<T, E>>
    where
        T: Send + 'a,
        E: Send + 'a,
    {
        match self {
            Outcome::Ready(result) => futures::future::ready(result).boxed(),
            Outcome::Pending(future) => future,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<'_, T, E> {
    fn from(result: Result<T, E>) -> Self {
        Outcome::Ready(result)
    }
}

type Callable<'a, T, E> = Box<dyn FnOnce(Option<T>) -> Outcome<'a, T, E> + Send + 'a>;

/// One element of a sequence run by [`series`](crate::series).
///
/// A `Call` step is invoked with the value produced by the previous step;
/// a `Value` step replaces that value with its own without running anything.
pub enum Step<'a, T, E> {
    Value(T),
    Call(Callable<'a, T, E>),
}

impl<'a, T, E> Step<'a, T, E> {
    pub fn call(f: impl FnOnce(Option<T>) -> Outcome<'a, T, E> + Send + 'a) -> Self {
        Step::Call(Box::new(f))
    }

    /// Runs the step against the accumulator.
    pub fn run(self, acc: Option<T>) -> Outcome<'a, T, E> {
        match self {
            Step::Value(value) => Outcome::ok(value),
            Step::Call(f) => f(acc),
        }
    }
}

impl<T, E> From<T> for Step<'_, T, E> {
    fn from(value: T) -> Self {
        Step::Value(value)
    }
}

/// What a function wrapped by [`safely_promisify`](crate::safely_promisify)
/// returned.
///
/// The wrapped function is expected to settle through exactly one path.
#[must_use]
pub enum Returned<'a, T, E> {
    /// Nothing was returned; completion arrives through the callback.
    Callback,

    /// A future carrying the result.
    Future(BoxFuture<'a, Result<T, E>>),

    /// A future that delivers its result through the callback and has to be
    /// driven for that to happen.
    Nodeified(BoxFuture<'a, ()>),

    /// The function failed before producing anything.
    Failed(E),
}

impl<'a, T, E> Returned<'a, T, E> {
    pub fn future(future: impl Future<Output = Result<T, E>> + Send + 'a) -> Self {
        Returned::Future(future.boxed())
    }

    pub fn nodeified(future: impl Future<Output = ()> + Send + 'a) -> Self {
        Returned::Nodeified(future.boxed())
    }
}
