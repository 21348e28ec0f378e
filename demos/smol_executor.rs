use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use asyncflow::{Outcome, series_with, whilst};
use futures_lite::future;
use macro_rules_attribute::apply;
use smol::Timer;
use smol_macros::{Executor, main};

#[apply(main!)]
async fn main(ex: &Executor<'_>) {
    let polls = Arc::new(AtomicUsize::new(0));
    let polls_cl = Arc::clone(&polls);

    // Steps run one after another even though the later ones sleep less.
    let steps = ex.spawn(series_with(
        [3u64, 2, 1],
        |secs, acc: Option<u64>| -> Outcome<'static, u64, std::io::Error> {
            Outcome::future(async move {
                println!("Step sleeping {secs}s");
                Timer::after(Duration::from_secs(secs)).await;
                Ok(acc.unwrap_or(0) + secs)
            })
        },
    ));

    let ticker = ex.spawn(whilst(
        move || polls_cl.load(Ordering::SeqCst) < 5,
        move || -> Outcome<'static, (), std::io::Error> {
            let polls = Arc::clone(&polls);
            Outcome::future(async move {
                Timer::after(Duration::from_millis(500)).await;
                println!("Tick {}", polls.fetch_add(1, Ordering::SeqCst) + 1);
                Ok(())
            })
        },
    ));

    println!("After spawn");
    let (slept, ticked) = future::zip(steps, ticker).await;
    println!("Slept {:?}s in total, ticker ended with {ticked:?}", slept);
}
