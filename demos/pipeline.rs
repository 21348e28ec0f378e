use std::{cell::Cell, time::Duration};

use asyncflow::{FlowExt, Outcome, Step, invoke_all, series, whilst};
use futures::future::Either;
use tracing::info;
use tracing_subscriber::EnvFilter;

type Out = Outcome<'static, u64, anyhow::Error>;

fn fetch(id: u64) -> impl FnOnce() -> Out {
    move || {
        Outcome::future(async move {
            tokio::time::sleep(Duration::from_millis(50 / id)).await;
            info!(id, "fetched");
            Ok(id * 10)
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Start every fetch at once; results keep their input order.
    let fetched = invoke_all((1..=5).map(fetch)).await?;
    println!("Fetched {fetched:?}");

    // Fold the results one step at a time.
    let steps = fetched.iter().map(|&n| {
        Step::call(move |acc: Option<u64>| -> Out {
            Outcome::future(async move { Ok(acc.unwrap_or(0) + n) })
        })
    });
    let total = series(std::iter::once(Step::Value(0)).chain(steps)).await?;
    println!("Total {total:?}");

    // Drain a budget in chunks.
    let budget = Cell::new(total.unwrap_or(0));
    whilst(
        || budget.get() > 0,
        || -> Outcome<'static, (), anyhow::Error> {
            budget.set(budget.get().saturating_sub(40));
            info!(budget = budget.get(), "spent");
            Outcome::ok(())
        },
    )
    .await?;

    let report = async move { Ok::<_, anyhow::Error>(fetched) }.spread_nodeify(Some(
        |r: anyhow::Result<(u64, u64, u64, u64, u64)>| match r {
            Ok((a, b, c, d, e)) => println!("Spread {a} {b} {c} {d} {e}"),
            Err(e) => println!("Could not spread: {e}"),
        },
    ));
    if let Either::Right(report) = report {
        report.await;
    }

    Ok(())
}
