use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::future::{self, BoxFuture, Either, Ready, TryJoinAll};
use pin_project_lite::pin_project;
use tracing::{debug, trace};

use crate::{error::FlowError, outcome::Outcome};

type Joined<'a, T, E> = Either<Ready<Result<Vec<T>, E>>, TryJoinAll<BoxFuture<'a, Result<T, E>>>>;

pin_project! {
    /// Future returned by [`invoke_all`].
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct InvokeAll<'a, T, E> {
        #[pin]
        inner: Joined<'a, T, E>,
    }
}

/// Starts every thunk right away, in order, and waits for all of them.
///
/// Each thunk must hand back [`Outcome::Pending`]. The first one that does
/// not stops the fan-out: thunks after it are not called and futures already
/// started are dropped. A synchronous failure (`Ready(Err(e))`) rejects with
/// `e` itself, a plain value rejects with [`FlowError::ProtocolViolation`]
/// naming its index. Otherwise the result resolves with the values in input
/// order or rejects with the first error.
pub fn invoke_all<'a, I, F, T, E>(thunks: I) -> InvokeAll<'a, T, E>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Outcome<'a, T, E>,
    E: From<FlowError>,
{
    let mut started = Vec::new();
    for (index, thunk) in thunks.into_iter().enumerate() {
        match thunk() {
            Outcome::Pending(future) => started.push(future),
            Outcome::Ready(Err(e)) => {
                debug!(index, started = started.len(), "thunk failed synchronously");
                return InvokeAll {
                    inner: Either::Left(future::ready(Err(e))),
                };
            }
            Outcome::Ready(Ok(_)) => {
                debug!(index, started = started.len(), "thunk did not return a future");
                let error = FlowError::ProtocolViolation { index }.into();
                return InvokeAll {
                    inner: Either::Left(future::ready(Err(error))),
                };
            }
        }
    }
    trace!(count = started.len(), "all thunks started");
    InvokeAll {
        inner: Either::Right(future::try_join_all(started)),
    }
}

impl<T, E> Future for InvokeAll<'_, T, E> {
    type Output = Result<Vec<T>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx)
    }
}
