//! Bridges from futures back to callbacks.
//!
//! [`Nodeify`] hands a future's `Result` to a callback once the future
//! settles. [`SpreadNodeify`] does the same for futures resolving to a
//! sequence, destructuring the sequence into the callback's positional
//! arguments first. Both are created through [`FlowExt`](crate::FlowExt).

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{FutureExt, future::Map, ready};
use pin_project_lite::pin_project;

use crate::error::FlowError;

const NOT_A_SEQUENCE: FlowError = FlowError::TypeMismatch("future did not resolve to a sequence");
const ARITY_MISMATCH: FlowError =
    FlowError::TypeMismatch("resolved sequence does not match the callback's arguments");

pin_project! {
    /// Future returned by [`FlowExt::nodeify`](crate::FlowExt::nodeify).
    ///
    /// Resolves to `()` after the callback ran.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct Nodeify<Fut, C> {
        #[pin]
        future: Fut,
        callback: Option<C>,
    }
}

impl<Fut, C> Nodeify<Fut, C> {
    pub(crate) fn new(future: Fut, callback: C) -> Self {
        Nodeify {
            future,
            callback: Some(callback),
        }
    }
}

impl<Fut, C, T, E> Future for Nodeify<Fut, C>
where
    Fut: Future<Output = Result<T, E>>,
    C: FnOnce(Result<T, E>),
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = ready!(this.future.poll(cx));
        let callback = this
            .callback
            .take()
            .unwrap_or_else(|| panic!("`Nodeify` polled after completion"));
        callback(result);
        Poll::Ready(())
    }
}

/// Capability test for "this value is a sequence that spreads into `Args`".
///
/// Fixed-arity tuples require the sequence to have exactly that many
/// elements; `Vec<T>` accepts any length.
pub trait Spread<Args> {
    fn spread(self) -> Result<Args, FlowError>;
}

impl<T> Spread<Vec<T>> for Vec<T> {
    fn spread(self) -> Result<Vec<T>, FlowError> {
        Ok(self)
    }
}

macro_rules! spread_tuple {
    (@T $name:ident) => { T };
    ($len:literal => $($name:ident)+) => {
        impl<T> Spread<($(spread_tuple!(@T $name),)+)> for Vec<T> {
            fn spread(self) -> Result<($(spread_tuple!(@T $name),)+), FlowError> {
                let [$($name),+]: [T; $len] = self.try_into().map_err(|_| ARITY_MISMATCH)?;
                Ok(($($name,)+))
            }
        }

        impl<T> Spread<($(spread_tuple!(@T $name),)+)> for [T; $len] {
            fn spread(self) -> Result<($(spread_tuple!(@T $name),)+), FlowError> {
                let [$($name),+] = self;
                Ok(($($name,)+))
            }
        }
    };
}

spread_tuple!(1 => a);
spread_tuple!(2 => a b);
spread_tuple!(3 => a b c);
spread_tuple!(4 => a b c d);
spread_tuple!(5 => a b c d e);
spread_tuple!(6 => a b c d e f);

#[cfg(feature = "json")]
impl<Args> Spread<Args> for serde_json::Value
where
    Vec<serde_json::Value>: Spread<Args>,
{
    fn spread(self) -> Result<Args, FlowError> {
        match self {
            serde_json::Value::Array(items) => items.spread(),
            _ => Err(NOT_A_SEQUENCE),
        }
    }
}

pub type SpreadFn<V, Args, E> = fn(Result<V, E>) -> Result<Args, E>;

fn spread_result<V, Args, E>(result: Result<V, E>) -> Result<Args, E>
where
    V: Spread<Args>,
    E: From<FlowError>,
{
    result.and_then(|value| value.spread().map_err(E::from))
}

pin_project! {
    /// Future returned by [`FlowExt::spread_nodeify`](crate::FlowExt::spread_nodeify)
    /// when a callback is given.
    ///
    /// The callback receives `Ok(args)` with the resolved sequence spread into
    /// its arguments, the rejection as `Err`, or a
    /// [`FlowError::TypeMismatch`] when the value does not spread.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct SpreadNodeify<Fut, C, V, Args, E> {
        #[pin]
        inner: Nodeify<Map<Fut, SpreadFn<V, Args, E>>, C>,
    }
}

impl<Fut, C, V, Args, E> SpreadNodeify<Fut, C, V, Args, E>
where
    Fut: Future<Output = Result<V, E>>,
    V: Spread<Args>,
    E: From<FlowError>,
{
    pub(crate) fn new(future: Fut, callback: C) -> Self {
        let spread: SpreadFn<V, Args, E> = spread_result::<V, Args, E>;
        SpreadNodeify {
            inner: Nodeify::new(future.map(spread), callback),
        }
    }
}

impl<Fut, C, V, Args, E> Future for SpreadNodeify<Fut, C, V, Args, E>
where
    Fut: Future<Output = Result<V, E>>,
    C: FnOnce(Result<Args, E>),
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project().inner.poll(cx)
    }
}
