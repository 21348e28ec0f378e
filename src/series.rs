//! Sequential iteration with short-circuit on the first failure.
//!
//! A [`Series`] folds an ordered sequence of work items into a single future.
//! Each item runs only after the previous one settled, receives the value the
//! previous one produced, and the first error ends the whole series. Items
//! that were not reached are dropped without running.

use std::{
    collections::VecDeque,
    mem,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{future::BoxFuture, ready};
use pin_project_lite::pin_project;
use tracing::{debug, trace};

use crate::outcome::{Outcome, Step};

pub type StepFn<'a, T, E> = fn(Step<'a, T, E>, Option<T>) -> Outcome<'a, T, E>;

pin_project! {
    /// Future returned by [`series`] and [`series_with`].
    ///
    /// Resolves to `Ok(None)` for an empty sequence and to `Ok(Some(last))`
    /// otherwise, where `last` is the value produced by the final item.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct Series<'a, X, T, E, F> {
        items: VecDeque<X>,
        iterator: F,
        acc: Option<T>,
        current: Option<BoxFuture<'a, Result<T, E>>>,
        index: usize,
    }
}

/// Runs a sequence of [`Step`]s in order.
///
/// `Step::Call` items are invoked with the accumulator, `Step::Value` items
/// become the accumulator without running anything.
///
/// # Example
/// ```
/// # use asyncflow::{Outcome, Step, series};
/// # futures::executor::block_on(async {
/// let steps: Vec<Step<'_, i32, ()>> = vec![
///     Step::Value(1),
///     Step::call(|acc| Outcome::ok(acc.unwrap_or(0) + 1)),
///     Step::call(|acc| Outcome::future(async move { Ok(acc.unwrap_or(0) * 10) })),
/// ];
/// assert_eq!(series(steps).await, Ok(Some(20)));
/// # });
/// ```
pub fn series<'a, T, E, I>(items: I) -> Series<'a, Step<'a, T, E>, T, E, StepFn<'a, T, E>>
where
    I: IntoIterator<Item = Step<'a, T, E>>,
{
    series_with(items, Step::run as StepFn<'a, T, E>)
}

/// Runs `iterator` over every item in order.
///
/// The iterator receives the current item and the value produced by the
/// previous call (`None` for the first one) and returns an [`Outcome`].
pub fn series_with<'a, X, T, E, F, I>(items: I, iterator: F) -> Series<'a, X, T, E, F>
where
    I: IntoIterator<Item = X>,
    F: FnMut(X, Option<T>) -> Outcome<'a, T, E>,
{
    Series {
        items: items.into_iter().collect(),
        iterator,
        acc: None,
        current: None,
        index: 0,
    }
}

impl<X, T, E, F> Series<'_, X, T, E, F> {
    /// Number of items not yet started.
    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    fn short_circuit(items: &mut VecDeque<X>, index: usize) {
        debug!(index, skipped = items.len(), "series stopped on failed step");
        items.clear();
        items.shrink_to_fit();
    }
}

impl<'a, X, T, E, F> Future for Series<'a, X, T, E, F>
where
    F: FnMut(X, Option<T>) -> Outcome<'a, T, E>,
{
    type Output = Result<Option<T>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        loop {
            if let Some(current) = this.current.as_mut() {
                let result = ready!(current.as_mut().poll(cx));
                this.current.take();
                match result {
                    Ok(value) => *this.acc = Some(value),
                    Err(e) => {
                        Self::short_circuit(this.items, *this.index - 1);
                        return Poll::Ready(Err(e));
                    }
                }
            }

            let Some(item) = this.items.pop_front() else {
                trace!(steps = *this.index, "series finished");
                return Poll::Ready(Ok(this.acc.take()));
            };
            let index = *this.index;
            *this.index += 1;
            trace!(index, "series step started");

            match (this.iterator)(item, this.acc.take()) {
                Outcome::Ready(Ok(value)) => *this.acc = Some(value),
                Outcome::Ready(Err(e)) => {
                    Self::short_circuit(this.items, index);
                    return Poll::Ready(Err(e));
                }
                Outcome::Pending(future) => *this.current = Some(future),
            }
        }
    }
}

enum State<'a, X, T, E, F> {
    Waiting(F),
    Running(Series<'a, X, T, E, F>),
    Done,
}

pin_project! {
    /// Future returned by [`FlowExt::series`](crate::FlowExt::series) and
    /// [`FlowExt::series_with`](crate::FlowExt::series_with).
    ///
    /// Waits for the source future, then runs a [`Series`] over the sequence
    /// it resolved to. A failed source skips the series entirely.
    #[must_use = "futures do nothing unless polled or .awaited"]
    pub struct SeriesThen<'a, Fut, X, T, E, F> {
        #[pin]
        source: Fut,
        state: State<'a, X, T, E, F>,
    }
}

impl<'a, Fut, X, T, E, F> SeriesThen<'a, Fut, X, T, E, F> {
    pub(crate) fn new(source: Fut, iterator: F) -> Self {
        SeriesThen {
            source,
            state: State::Waiting(iterator),
        }
    }
}

impl<'a, Fut, I, X, T, E, F> Future for SeriesThen<'a, Fut, X, T, E, F>
where
    Fut: Future<Output = Result<I, E>>,
    I: IntoIterator<Item = X>,
    F: FnMut(X, Option<T>) -> Outcome<'a, T, E>,
{
    type Output = Result<Option<T>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        loop {
            match &mut *this.state {
                State::Running(series) => {
                    let output = ready!(Pin::new(series).poll(cx));
                    *this.state = State::Done;
                    return Poll::Ready(output);
                }
                State::Waiting(_) => {
                    let items = ready!(this.source.as_mut().poll(cx));
                    let State::Waiting(iterator) = mem::replace(this.state, State::Done) else {
                        unreachable!()
                    };
                    match items {
                        Ok(items) => *this.state = State::Running(series_with(items, iterator)),
                        Err(e) => return Poll::Ready(Err(e)),
                    }
                }
                State::Done => panic!("`SeriesThen` polled after completion"),
            }
        }
    }
}
