//! Adapter that turns any of three asynchronous calling conventions into a
//! single future-returning one.
//!
//! A function wrapped with [`safely_promisify`] receives an [`Invocation`]
//! with its arguments and a [`Completion`] callback, and may settle in exactly
//! one of these ways:
//!
//! 1. call the completion callback and return [`Returned::Callback`],
//! 2. return a future with [`Returned::Future`],
//! 3. return a future that reports through the callback with
//!    [`Returned::Nodeified`].
//!
//! Whichever it picks, calling the wrapped function yields a
//! [`PromisifyFuture`] that resolves with the single success value or rejects
//! with the single error. If a function uses more than one path, the first
//! one to settle wins and the others are dropped. Every path (the callback, a
//! returned future, a synchronous failure, a captured error) claims the same
//! flag when it settles, so the winner is decided by when it happened and not
//! by the order in which the call is polled.
//!
//! A returned future does not lock the call to itself: a callback that fires
//! while the returned future is still pending settles the call. Promise-based
//! adapters usually do the opposite and ignore the callback once a promise
//! was returned.
//!
//! With error capture enabled every call gets its own [`CaptureScope`]; see
//! the [`capture`](crate::capture) module.

use std::{
    marker::PhantomData,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use futures::{
    FutureExt, StreamExt,
    channel::{mpsc::UnboundedReceiver, oneshot},
    future::BoxFuture,
};
use pin_project_lite::pin_project;
use tracing::{debug, trace, warn};

use crate::{
    capture::{CaptureScope, ErrorSink},
    error::FlowError,
    outcome::Returned,
};

/// The `(error, result)` callback appended to every call.
///
/// It is consumed when used, so it can fire at most once.
pub struct Completion<T, E> {
    sender: oneshot::Sender<Result<T, E>>,
    claim: Arc<AtomicBool>,
}

impl<T, E> Completion<T, E> {
    pub fn complete(self, result: Result<T, E>) {
        if self.claim.swap(true, Ordering::AcqRel) || self.sender.send(result).is_err() {
            trace!("completion arrived after the call settled, discarded");
        }
    }

    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn reject(self, error: E) {
        self.complete(Err(error));
    }

    /// Returns `true` if the call already settled through another path or
    /// was dropped.
    pub fn is_canceled(&self) -> bool {
        self.claim.load(Ordering::Acquire) || self.sender.is_canceled()
    }
}

/// Everything a wrapped function receives for one call.
pub struct Invocation<R, A, T, E> {
    /// The bound receiver, or the call-site receiver if none is bound.
    pub receiver: Option<R>,
    pub args: A,
    pub done: Completion<T, E>,
    /// Present only when error capture is enabled.
    pub scope: Option<CaptureScope<E>>,
}

impl<R, A, T, E> Invocation<R, A, T, E> {
    /// Shorthand for an [`ErrorSink`] of this call's scope.
    ///
    /// Returns `None` without capture, or once the scope has been exited.
    pub fn sink(&self) -> Option<ErrorSink<E>> {
        self.scope.as_ref()?.sink()
    }
}

/// A function wrapped by [`safely_promisify`].
pub struct Promisify<F, R, A, T, E> {
    func: F,
    receiver: Option<R>,
    capture: bool,
    _marker: PhantomData<fn(A) -> (T, E)>,
}

/// Wraps `func` so that every call returns a [`PromisifyFuture`].
///
/// `receiver` binds the receiver handed to every call; without it the
/// call-site receiver of [`Promisify::call_on`] is used. With
/// `capture_errors` each call runs inside a fresh [`CaptureScope`].
///
/// # Example
/// ```
/// # use asyncflow::{FlowError, Invocation, Returned, safely_promisify};
/// # futures::executor::block_on(async {
/// let double = safely_promisify(
///     |inv: Invocation<(), (u32,), u32, FlowError>| {
///         inv.done.resolve(inv.args.0 * 2);
///         Returned::Callback
///     },
///     None,
///     false,
/// );
/// assert_eq!(double.call((21,)).await, Ok(42));
/// # });
/// ```
pub fn safely_promisify<'a, F, R, A, T, E>(
    func: F,
    receiver: Option<R>,
    capture_errors: bool,
) -> Promisify<F, R, A, T, E>
where
    F: Fn(Invocation<R, A, T, E>) -> Returned<'a, T, E>,
{
    let mut promisified = Promisify::new(func);
    if let Some(receiver) = receiver {
        promisified.bind(receiver);
    }
    if capture_errors {
        promisified.capture_errors();
    }
    promisified
}

impl<F, R, A, T, E> Promisify<F, R, A, T, E> {
    /// Wraps `func` with no bound receiver and no error capture.
    pub fn new<'a>(func: F) -> Self
    where
        F: Fn(Invocation<R, A, T, E>) -> Returned<'a, T, E>,
    {
        Self {
            func,
            receiver: None,
            capture: false,
            _marker: PhantomData,
        }
    }

    /// Binds the receiver passed to every call, overriding call-site receivers.
    pub fn bind(&mut self, receiver: R) -> &mut Self {
        self.receiver = Some(receiver);
        self
    }

    /// Runs every call inside its own [`CaptureScope`].
    pub fn capture_errors(&mut self) -> &mut Self {
        self.capture = true;
        self
    }

    /// Calls the wrapped function with the bound receiver, if any.
    ///
    /// The function runs immediately; the returned future only collects its
    /// result.
    pub fn call<'a>(&self, args: A) -> PromisifyFuture<'a, T, E>
    where
        F: Fn(Invocation<R, A, T, E>) -> Returned<'a, T, E>,
        R: Clone,
    {
        self.invoke(self.receiver.clone(), args)
    }

    /// Method-style call: `receiver` is used unless a receiver is bound.
    pub fn call_on<'a>(&self, receiver: R, args: A) -> PromisifyFuture<'a, T, E>
    where
        F: Fn(Invocation<R, A, T, E>) -> Returned<'a, T, E>,
        R: Clone,
    {
        self.invoke(self.receiver.clone().or(Some(receiver)), args)
    }

    fn invoke<'a>(&self, receiver: Option<R>, args: A) -> PromisifyFuture<'a, T, E>
    where
        F: Fn(Invocation<R, A, T, E>) -> Returned<'a, T, E>,
    {
        let (sender, callback) = oneshot::channel();
        let claim = Arc::new(AtomicBool::new(false));
        let (scope, captured) = match self.capture {
            true => {
                let (scope, captured) = CaptureScope::with_claim(Some(Arc::clone(&claim)));
                (Some(scope), Some(captured))
            }
            false => (None, None),
        };
        let invocation = Invocation {
            receiver,
            args,
            done: Completion {
                sender,
                claim: Arc::clone(&claim),
            },
            scope: scope.clone(),
        };

        let returned = match &scope {
            Some(scope) => scope.in_scope(|| (self.func)(invocation)),
            None => (self.func)(invocation),
        };

        let mut future = PromisifyFuture {
            callback: Some(callback),
            returned: None,
            driven: None,
            captured,
            failed: None,
            scope,
            claim,
            settled: false,
        };
        match returned {
            Returned::Callback => {
                if let Some(scope) = &future.scope {
                    scope.seal();
                }
            }
            Returned::Future(f) => future.returned = Some(f),
            Returned::Nodeified(f) => future.driven = Some(f),
            Returned::Failed(e) => {
                if future.claim.swap(true, Ordering::AcqRel) {
                    trace!("function failed after the call settled, discarded");
                } else {
                    future.failed = Some(e);
                }
            }
        }
        future
    }
}

pin_project! {
    /// Future returned by a call to a [`Promisify`]-wrapped function.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct PromisifyFuture<'a, T, E> {
        callback: Option<oneshot::Receiver<Result<T, E>>>,
        returned: Option<BoxFuture<'a, Result<T, E>>>,
        driven: Option<BoxFuture<'a, ()>>,
        captured: Option<UnboundedReceiver<E>>,
        failed: Option<E>,
        scope: Option<CaptureScope<E>>,
        claim: Arc<AtomicBool>,
        settled: bool,
    }
}

impl<T, E> PromisifyFuture<'_, T, E> {
    fn settle(&mut self, source: &'static str, result: Result<T, E>) -> Poll<Result<T, E>> {
        debug!(source, ok = result.is_ok(), "promisified call settled");
        self.settled = true;
        self.callback.take();
        self.returned.take();
        self.driven.take();
        self.captured.take();
        if let Some(scope) = &self.scope {
            scope.close();
        }
        Poll::Ready(result)
    }
}

fn poll_in_scope<O, E>(
    scope: &Option<CaptureScope<E>>,
    future: &mut BoxFuture<'_, O>,
    cx: &mut Context<'_>,
) -> Poll<O> {
    match scope {
        Some(scope) => scope.in_scope(|| future.poll_unpin(cx)),
        None => future.poll_unpin(cx),
    }
}

impl<T, E> Future for PromisifyFuture<'_, T, E>
where
    E: From<FlowError>,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.settled {
            panic!("`PromisifyFuture` polled after completion");
        }

        if let Some(e) = this.failed.take() {
            return this.settle("failed", Err(e));
        }

        if let Some(driven) = this.driven.as_mut() {
            if poll_in_scope(&this.scope, driven, cx).is_ready() {
                this.driven.take();
                if let Some(scope) = &this.scope {
                    scope.seal();
                }
            }
        }

        if let Some(callback) = this.callback.as_mut() {
            match callback.poll_unpin(cx) {
                Poll::Ready(Ok(result)) => return this.settle("callback", result),
                Poll::Ready(Err(oneshot::Canceled)) => {
                    trace!("completion callback dropped without being called");
                    this.callback.take();
                }
                Poll::Pending => {}
            }
        }

        if let Some(captured) = this.captured.as_mut() {
            match captured.poll_next_unpin(cx) {
                Poll::Ready(Some(e)) => return this.settle("captured", Err(e)),
                Poll::Ready(None) => {
                    this.captured.take();
                }
                Poll::Pending => {}
            }
        }

        if let Some(returned) = this.returned.as_mut() {
            if let Poll::Ready(result) = poll_in_scope(&this.scope, returned, cx) {
                this.returned.take();
                if !this.claim.swap(true, Ordering::AcqRel) {
                    return this.settle("future", result);
                }
                // Another path settled first; its result is on the way.
                trace!("returned future finished after the call settled, discarded");
            }
        }

        if this.callback.is_none()
            && this.returned.is_none()
            && this.driven.is_none()
            && this.captured.is_none()
        {
            warn!("wrapped function left no way to settle the call");
            return this.settle("abandoned", Err(FlowError::Abandoned.into()));
        }
        Poll::Pending
    }
}
