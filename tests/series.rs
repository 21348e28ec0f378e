use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use asyncflow::{FlowExt, Outcome, Step, series, series_with};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
struct Bad(&'static str);

type Out = Outcome<'static, i32, Bad>;

#[tokio::test(flavor = "multi_thread")]
async fn series_with_iterator() {
    let result = Arc::new(Mutex::new(Vec::new()));
    let result_cl = Arc::clone(&result);
    let orig = vec![0, 1, 2, 3, 4];

    let r = series_with(orig.clone(), move |elem: i32, _acc: Option<i32>| -> Out {
        result_cl.lock().unwrap().push(elem);
        Outcome::ok(elem)
    })
    .await;

    assert_eq!(r, Ok(Some(4)), "Series should resolve with the last value");
    assert_eq!(*result.lock().unwrap(), orig, "Every element should run in order");
}

#[tokio::test(flavor = "multi_thread")]
async fn series_with_iterator_returning_futures() {
    let result = Arc::new(Mutex::new(Vec::new()));
    let result_cl = Arc::clone(&result);
    let orig = vec![0, 1, 2, 3, 4];

    let r = series_with(orig.clone(), move |elem: i32, _acc: Option<i32>| -> Out {
        let result = Arc::clone(&result_cl);
        Outcome::future(async move {
            // Later elements finish faster; order must still hold.
            tokio::time::sleep(std::time::Duration::from_millis(5 * (5 - elem as u64))).await;
            result.lock().unwrap().push(elem);
            Ok(elem)
        })
    })
    .await;

    assert_eq!(r, Ok(Some(4)));
    assert_eq!(*result.lock().unwrap(), orig);
}

#[tokio::test(flavor = "multi_thread")]
async fn series_each_step_receives_previous_value() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let steps: Vec<Step<'static, i32, Bad>> = (0..5)
        .map(|_| {
            let seen = Arc::clone(&seen);
            Step::call(move |acc| {
                seen.lock().unwrap().push(acc);
                Outcome::future(async move { Ok(acc.unwrap_or(0) + 1) })
            })
        })
        .collect();

    let r = series(steps).await;
    assert_eq!(r, Ok(Some(5)));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![None, Some(1), Some(2), Some(3), Some(4)],
        "Each step should see the value produced by the step before it"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn series_stops_after_first_error() {
    for limit in 1..=3 {
        let result = Arc::new(Mutex::new(Vec::new()));
        let result_cl = Arc::clone(&result);

        let r = series_with(vec![0, 1, 2, 3, 4], move |elem: i32, _acc: Option<i32>| -> Out {
            if elem == limit {
                return Outcome::err(Bad("BAAAAAD"));
            }
            result_cl.lock().unwrap().push(elem);
            Outcome::ok(elem)
        })
        .await;

        assert_eq!(r, Err(Bad("BAAAAAD")));
        let result = result.lock().unwrap();
        assert_eq!(result.len(), limit as usize, "No step after the failing one should run");
        assert!(result.iter().copied().eq(0..limit));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn series_stops_after_first_rejected_future() {
    for limit in 1..=3 {
        let result = Arc::new(Mutex::new(Vec::new()));
        let result_cl = Arc::clone(&result);

        let r = series_with(vec![0, 1, 2, 3, 4], move |elem: i32, _acc: Option<i32>| -> Out {
            let result = Arc::clone(&result_cl);
            Outcome::future(async move {
                tokio::task::yield_now().await;
                if elem == limit {
                    return Err(Bad("BAAAAAD"));
                }
                result.lock().unwrap().push(elem);
                Ok(elem)
            })
        })
        .await;

        assert_eq!(r, Err(Bad("BAAAAAD")));
        assert_eq!(result.lock().unwrap().len(), limit as usize);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn series_without_iterator() {
    let result = Arc::new(Mutex::new(Vec::new()));
    let steps: Vec<Step<'static, i32, Bad>> = (0..5)
        .map(|elem| {
            if elem == 0 {
                // Plain values become the accumulator without running anything.
                return Step::Value(elem);
            }
            let result = Arc::clone(&result);
            Step::call(move |acc| {
                if elem == 1 {
                    assert_eq!(acc, Some(0), "Values should be passed along");
                }
                result.lock().unwrap().push(elem);
                Outcome::ok(elem)
            })
        })
        .collect();

    let r = series(steps).await;
    assert_eq!(r, Ok(Some(4)));
    assert_eq!(*result.lock().unwrap(), vec![1, 2, 3, 4], "No push for the value step");
}

#[tokio::test(flavor = "multi_thread")]
async fn series_without_iterator_stops_after_first_error() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let steps: Vec<Step<'static, i32, Bad>> = (0..5)
        .map(|elem| {
            let invoked = Arc::clone(&invoked);
            Step::call(move |_| {
                invoked.fetch_add(1, Ordering::SeqCst);
                Outcome::future(async move {
                    if elem == 2 {
                        return Err(Bad("step 2"));
                    }
                    Ok(elem)
                })
            })
        })
        .collect();

    assert_eq!(series(steps).await, Err(Bad("step 2")));
    assert_eq!(invoked.load(Ordering::SeqCst), 3, "Steps 3 and 4 should never be invoked");
}

#[tokio::test(flavor = "multi_thread")]
async fn series_empty_resolves_with_nothing() {
    let steps: Vec<Step<'static, i32, Bad>> = Vec::new();
    assert_eq!(series(steps).await, Ok(None));

    let invoked = Arc::new(AtomicUsize::new(0));
    let invoked_cl = Arc::clone(&invoked);
    let r = series_with(Vec::<i32>::new(), move |_: i32, _: Option<i32>| -> Out {
        invoked_cl.fetch_add(1, Ordering::SeqCst);
        Outcome::ok(0)
    })
    .await;
    assert_eq!(r, Ok(None));
    assert_eq!(invoked.load(Ordering::SeqCst), 0, "No step should run");
}

#[tokio::test(flavor = "multi_thread")]
async fn series_long_synchronous_sequence() {
    let r = series_with(0..100_000, |elem: i32, acc: Option<i32>| -> Out {
        Outcome::ok(acc.unwrap_or(0).wrapping_add(elem))
    })
    .await;
    assert_eq!(r, Ok(Some((0..100_000).fold(0i32, |a, b| a.wrapping_add(b)))));
}

#[tokio::test(flavor = "multi_thread")]
async fn series_chained_on_future() {
    let source = async { Ok::<_, Bad>(vec![1, 2, 3]) };
    let r = source
        .series_with(|elem: i32, acc: Option<i32>| -> Out { Outcome::ok(acc.unwrap_or(0) + elem) })
        .await;
    assert_eq!(r, Ok(Some(6)));

    let source = async {
        Ok::<_, Bad>(vec![
            Step::Value(10),
            Step::call(|acc: Option<i32>| Outcome::ok(acc.unwrap_or(0) * 2)),
        ])
    };
    assert_eq!(source.series().await, Ok(Some(20)));
}

#[tokio::test(flavor = "multi_thread")]
async fn series_chained_on_rejected_future() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let invoked_cl = Arc::clone(&invoked);
    let source = async { Err::<Vec<i32>, _>(Bad("no sequence")) };

    let r = source
        .series_with(move |_: i32, _: Option<i32>| -> Out {
            invoked_cl.fetch_add(1, Ordering::SeqCst);
            Outcome::ok(0)
        })
        .await;

    assert_eq!(r, Err(Bad("no sequence")));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}
