use futures::future::Either;

use crate::{
    error::FlowError,
    nodeify::{Nodeify, Spread, SpreadNodeify},
    outcome::{Outcome, Step},
    series::{SeriesThen, StepFn},
};

/// Extend `Future` with control-flow operations.
pub trait FlowExt: Future {
    /// Runs [`series`](crate::series) over the sequence this future resolves to.
    fn series<'a, I, T, E>(self) -> SeriesThen<'a, Self, Step<'a, T, E>, T, E, StepFn<'a, T, E>>
    where
        Self: Future<Output = Result<I, E>> + Sized,
        I: IntoIterator<Item = Step<'a, T, E>>,
    {
        SeriesThen::new(self, Step::run as StepFn<'a, T, E>)
    }

    /// Runs [`series_with`](crate::series_with) over the sequence this future
    /// resolves to.
    fn series_with<'a, I, X, T, E, F>(self, iterator: F) -> SeriesThen<'a, Self, X, T, E, F>
    where
        Self: Future<Output = Result<I, E>> + Sized,
        I: IntoIterator<Item = X>,
        F: FnMut(X, Option<T>) -> Outcome<'a, T, E>,
    {
        SeriesThen::new(self, iterator)
    }

    /// Hands the result to `callback` once the future settles.
    fn nodeify<C, T, E>(self, callback: C) -> Nodeify<Self, C>
    where
        Self: Future<Output = Result<T, E>> + Sized,
        C: FnOnce(Result<T, E>),
    {
        Nodeify::new(self, callback)
    }

    /// Like [`nodeify`](Self::nodeify), with the resolved sequence spread into
    /// the callback's arguments.
    ///
    /// Without a callback the future itself comes back untouched as
    /// `Either::Left`, so APIs can take an optional callback and return the
    /// future when none is given.
    fn spread_nodeify<C, V, Args, E>(
        self,
        callback: Option<C>,
    ) -> Either<Self, SpreadNodeify<Self, C, V, Args, E>>
    where
        Self: Future<Output = Result<V, E>> + Sized,
        V: Spread<Args>,
        E: From<FlowError>,
        C: FnOnce(Result<Args, E>),
    {
        match callback {
            Some(callback) => Either::Right(SpreadNodeify::new(self, callback)),
            None => Either::Left(self),
        }
    }
}

impl<T> FlowExt for T where T: Future {}
