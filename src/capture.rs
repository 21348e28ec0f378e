//! Scoped capture of errors raised outside any future chain.
//!
//! Work started by a wrapped function does not always flow back through the
//! future it returns: a callback handed to a thread pool or a timer runs on
//! its own and has nowhere to send a failure. A [`CaptureScope`] gives such
//! code a way back. While the scope is entered, [`CaptureScope::sink`] hands
//! out [`ErrorSink`]s; a sink stays bound to its call after the scope is
//! exited, and whatever it reports rejects that call.
//!
//! Scopes are explicit values. There is no ambient "current scope", so nested
//! calls each see exactly the scope they were given. Entering is tracked per
//! thread: a clone of the scope held by another thread does not count as
//! entered while this one runs inside it.

use std::{
    cell::RefCell,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};

use crate::error::Panicked;

thread_local! {
    // Scopes entered on this thread, innermost last.
    static ENTERED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

struct ScopeInner<E> {
    closed: AtomicBool,
    claim: Option<Arc<AtomicBool>>,
    sender: Mutex<Option<UnboundedSender<E>>>,
}

/// Error-capture region owned by a single in-flight call.
pub struct CaptureScope<E> {
    inner: Arc<ScopeInner<E>>,
}

impl<E> Clone for CaptureScope<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> CaptureScope<E> {
    /// Creates a scope together with the receiving end that collects what its
    /// sinks report.
    pub fn new() -> (Self, UnboundedReceiver<E>) {
        Self::with_claim(None)
    }

    /// Like [`new`](Self::new), but a report only goes through if it is the
    /// first to set `claim`. The owning call shares the flag with its other
    /// completion paths so that whichever settles first wins.
    pub(crate) fn with_claim(claim: Option<Arc<AtomicBool>>) -> (Self, UnboundedReceiver<E>) {
        let (sender, receiver) = mpsc::unbounded();
        let scope = Self {
            inner: Arc::new(ScopeInner {
                closed: AtomicBool::new(false),
                claim,
                sender: Mutex::new(Some(sender)),
            }),
        };
        (scope, receiver)
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Enters the scope on the current thread until the returned guard is
    /// dropped.
    pub fn enter(&self) -> Entered<'_, E> {
        let id = self.id();
        let depth = ENTERED.with(|entered| {
            let mut entered = entered.borrow_mut();
            entered.push(id);
            entered.len()
        });
        trace!(depth, "capture scope entered");
        Entered {
            scope: self,
            _not_send: PhantomData,
        }
    }

    /// Runs `f` inside the scope.
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _entered = self.enter();
        f()
    }

    /// Returns `true` while the current thread holds an [`Entered`] guard for
    /// this scope.
    pub fn is_active(&self) -> bool {
        let id = self.id();
        ENTERED.with(|entered| entered.borrow().contains(&id))
    }

    /// Returns `true` once the owning call has settled.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Hands out a sink bound to this scope.
    ///
    /// Returns `None` when the current thread has not entered the scope, or
    /// the scope is already closed.
    pub fn sink(&self) -> Option<ErrorSink<E>> {
        if !self.is_active() || self.is_closed() {
            return None;
        }
        let sender = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        Some(ErrorSink {
            sender,
            claim: self.inner.claim.clone(),
        })
    }

    /// Stops handing out sinks. Sinks created earlier keep working until the
    /// receiving end goes away.
    pub(crate) fn seal(&self) {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Seals the scope and marks the owning call as settled.
    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.seal();
        trace!("capture scope closed");
    }
}

/// Guard returned by [`CaptureScope::enter`]. Exits the scope on drop.
///
/// The guard is bound to the thread that entered and cannot be sent.
#[must_use = "dropping the guard exits the scope immediately"]
pub struct Entered<'s, E> {
    scope: &'s CaptureScope<E>,
    _not_send: PhantomData<*const ()>,
}

impl<E> Entered<'_, E> {
    /// Hands out a sink bound to the entered scope.
    pub fn sink(&self) -> Option<ErrorSink<E>> {
        self.scope.sink()
    }
}

impl<E> Drop for Entered<'_, E> {
    fn drop(&mut self) {
        let id = self.scope.id();
        let depth = ENTERED.with(|entered| {
            let mut entered = entered.borrow_mut();
            if let Some(pos) = entered.iter().rposition(|&e| e == id) {
                entered.remove(pos);
            }
            entered.len()
        });
        trace!(depth, "capture scope exited");
    }
}

/// Reports errors into the call whose [`CaptureScope`] created it.
pub struct ErrorSink<E> {
    sender: UnboundedSender<E>,
    claim: Option<Arc<AtomicBool>>,
}

impl<E> Clone for ErrorSink<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            claim: self.claim.clone(),
        }
    }
}

impl<E> ErrorSink<E> {
    /// Rejects the owning call with `error`.
    ///
    /// Returns `false` if the call has already settled, in which case the
    /// error is dropped.
    pub fn report(&self, error: E) -> bool {
        if self
            .claim
            .as_ref()
            .is_some_and(|claim| claim.swap(true, Ordering::AcqRel))
        {
            debug!("captured error arrived after the call settled, discarded");
            return false;
        }
        match self.sender.unbounded_send(error) {
            Ok(()) => {
                debug!("error reported through capture scope");
                true
            }
            Err(_) => {
                debug!("captured error arrived after the call settled, discarded");
                false
            }
        }
    }

    /// Runs `f`, reporting its error if it fails.
    pub fn guard<R>(&self, f: impl FnOnce() -> Result<R, E>) -> Option<R> {
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    /// Like [`guard`](Self::guard), but also turns a panic inside `f` into a
    /// reported error.
    pub fn guard_unwind<R>(&self, f: impl FnOnce() -> Result<R, E>) -> Option<R>
    where
        E: From<Panicked>,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => self.guard(|| result),
            Err(payload) => {
                self.report(Panicked::from_payload(payload).into());
                None
            }
        }
    }

    /// Returns `true` if the owning call has settled and reports are dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
