use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use asyncflow::{Outcome, whilst};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
struct Bad(&'static str);

type Out = Outcome<'static, (), Bad>;

#[tokio::test(flavor = "multi_thread")]
async fn whilst_runs_until_condition_fails() {
    let result = Arc::new(Mutex::new(Vec::new()));
    let result_cond = Arc::clone(&result);
    let result_action = Arc::clone(&result);
    let mut counter = 0;

    let r = whilst(
        move || result_cond.lock().unwrap().len() < 7,
        move || -> Out {
            result_action.lock().unwrap().push(counter);
            counter += 1;
            Outcome::ok(())
        },
    )
    .await;

    assert_eq!(r, Ok(()));
    assert_eq!(*result.lock().unwrap(), vec![0, 1, 2, 3, 4, 5, 6]);
}

#[tokio::test(flavor = "multi_thread")]
async fn whilst_action_returning_future() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_cond = Arc::clone(&counter);
    let counter_action = Arc::clone(&counter);

    let r = whilst(
        move || counter_cond.load(Ordering::SeqCst) < 7,
        move || -> Out {
            let counter = Arc::clone(&counter_action);
            Outcome::future(async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        },
    )
    .await;

    assert_eq!(r, Ok(()));
    assert_eq!(counter.load(Ordering::SeqCst), 7, "Action should run exactly 7 times");
}

#[tokio::test(flavor = "multi_thread")]
async fn whilst_stops_on_error() {
    let result = Arc::new(Mutex::new(Vec::new()));
    let result_cl = Arc::clone(&result);
    let checks = Arc::new(AtomicUsize::new(0));
    let checks_cl = Arc::clone(&checks);
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_cl = Arc::clone(&counter);

    let r = whilst(
        move || {
            checks_cl.fetch_add(1, Ordering::SeqCst);
            true
        },
        move || -> Out {
            let counter = Arc::clone(&counter_cl);
            let result = Arc::clone(&result_cl);
            Outcome::future(async move {
                let n = counter.load(Ordering::SeqCst);
                if n == 7 {
                    return Err(Bad("BAAD"));
                }
                result.lock().unwrap().push(n);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        },
    )
    .await;

    assert_eq!(r, Err(Bad("BAAD")));
    assert_eq!(counter.load(Ordering::SeqCst), 7, "Counter should be frozen at 7");
    assert_eq!(*result.lock().unwrap(), vec![0, 1, 2, 3, 4, 5, 6]);
    assert_eq!(
        checks.load(Ordering::SeqCst),
        8,
        "Condition should not be checked again after the failure"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn whilst_synchronous_error() {
    let mut runs = 0;
    let r = whilst(
        || true,
        || -> Out {
            runs += 1;
            if runs == 3 {
                return Outcome::err(Bad("third"));
            }
            Outcome::ok(())
        },
    )
    .await;

    assert_eq!(r, Err(Bad("third")));
    assert_eq!(runs, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn whilst_false_condition_never_runs_action() {
    let runs = AtomicUsize::new(0);
    let r = whilst(
        || false,
        || -> Out {
            runs.fetch_add(1, Ordering::SeqCst);
            Outcome::ok(())
        },
    )
    .await;

    assert_eq!(r, Ok(()));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn whilst_does_nothing_until_polled() {
    let checks = AtomicUsize::new(0);
    let looped = whilst(
        || {
            checks.fetch_add(1, Ordering::SeqCst);
            false
        },
        || -> Out { Outcome::ok(()) },
    );
    assert_eq!(checks.load(Ordering::SeqCst), 0, "Condition should wait for the first poll");
    assert_eq!(looped.await, Ok(()));
    assert_eq!(checks.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn whilst_many_iterations() {
    let counter = AtomicUsize::new(0);
    let r = whilst(
        || counter.load(Ordering::Relaxed) < 100_000,
        || -> Out {
            counter.fetch_add(1, Ordering::Relaxed);
            Outcome::ok(())
        },
    )
    .await;
    assert_eq!(r, Ok(()));
    assert_eq!(counter.load(Ordering::Relaxed), 100_000);
}

// On a single-threaded runtime the loop only ends if it yields to the
// spawned task between iterations.
#[tokio::test]
async fn whilst_yields_between_iterations() {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_cl = Arc::clone(&stop);
    tokio::spawn(async move {
        stop_cl.store(true, Ordering::SeqCst);
    });

    let mut iterations = 0usize;
    let r = whilst(
        || !stop.load(Ordering::SeqCst),
        || -> Out {
            iterations += 1;
            Outcome::ok(())
        },
    )
    .await;

    assert_eq!(r, Ok(()));
    assert!(iterations >= 1, "At least one iteration should run before the spawned task");
}
