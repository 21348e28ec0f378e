//! Conditional repeat loop driven by the executor.
//!
//! [`Whilst`] checks a synchronous condition before every iteration and runs
//! an action while it holds. After each completed iteration the future wakes
//! itself and yields, so the next iteration is scheduled by the executor
//! rather than by recursion, and a long loop never deepens the stack or
//! starves other tasks.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{future::BoxFuture, ready};
use pin_project_lite::pin_project;
use tracing::{debug, trace};

use crate::outcome::Outcome;

pin_project! {
    /// Future returned by [`whilst`].
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct Whilst<'a, C, A, T, E> {
        condition: C,
        action: A,
        current: Option<BoxFuture<'a, Result<T, E>>>,
        iterations: usize,
        finished: bool,
    }
}

/// Runs `action` for as long as `condition` returns `true`.
///
/// Nothing happens until the returned future is first polled; the condition
/// is then checked before every iteration, including the first one. The loop
/// resolves with `Ok(())` once the condition is false and rejects with the
/// action's error as soon as one iteration fails, without checking the
/// condition again. Values produced by the action are discarded.
///
/// # Example
/// ```
/// # use asyncflow::{Outcome, whilst};
/// # futures::executor::block_on(async {
/// let counter = std::cell::Cell::new(0);
/// let r: Result<(), ()> = whilst(
///     || counter.get() < 7,
///     || {
///         counter.set(counter.get() + 1);
///         Outcome::ok(())
///     },
/// )
/// .await;
/// assert_eq!(r, Ok(()));
/// assert_eq!(counter.get(), 7);
/// # });
/// ```
pub fn whilst<'a, C, A, T, E>(condition: C, action: A) -> Whilst<'a, C, A, T, E>
where
    C: FnMut() -> bool,
    A: FnMut() -> Outcome<'a, T, E>,
{
    Whilst {
        condition,
        action,
        current: None,
        iterations: 0,
        finished: false,
    }
}

impl<C, A, T, E> Whilst<'_, C, A, T, E> {
    /// Number of iterations that completed successfully so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

impl<'a, C, A, T, E> Future for Whilst<'a, C, A, T, E>
where
    C: FnMut() -> bool,
    A: FnMut() -> Outcome<'a, T, E>,
{
    type Output = Result<(), E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if *this.finished {
            panic!("`Whilst` polled after completion");
        }

        if this.current.is_none() {
            if !(this.condition)() {
                trace!(iterations = *this.iterations, "whilst condition no longer holds");
                *this.finished = true;
                return Poll::Ready(Ok(()));
            }
            match (this.action)() {
                Outcome::Ready(Ok(_)) => {
                    *this.iterations += 1;
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }
                Outcome::Ready(Err(e)) => {
                    debug!(iteration = *this.iterations, "whilst action failed");
                    *this.finished = true;
                    return Poll::Ready(Err(e));
                }
                Outcome::Pending(future) => *this.current = Some(future),
            }
        }

        let Some(current) = this.current.as_mut() else {
            return Poll::Pending;
        };
        let result = ready!(current.as_mut().poll(cx));
        this.current.take();
        if let Err(e) = result {
            debug!(iteration = *this.iterations, "whilst action failed");
            *this.finished = true;
            return Poll::Ready(Err(e));
        }
        *this.iterations += 1;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
