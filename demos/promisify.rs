use std::{thread, time::Duration};

use anyhow::anyhow;
use asyncflow::{FlowExt, Invocation, Returned, safely_promisify};
use futures::executor::ThreadPool;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct Greeter {
    name: &'static str,
}

type Greet = Invocation<Greeter, (u64,), String, anyhow::Error>;

// Callback style: reports from a worker thread.
fn greet_later(inv: Greet) -> Returned<'static, String, anyhow::Error> {
    let Invocation {
        receiver,
        args: (millis,),
        done,
        ..
    } = inv;
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(millis));
        match receiver {
            Some(greeter) => done.resolve(format!("hello from {}", greeter.name)),
            None => done.reject(anyhow!("nobody to greet from")),
        }
    });
    Returned::Callback
}

// Future style.
fn greet_async(inv: Greet) -> Returned<'static, String, anyhow::Error> {
    Returned::future(async move {
        tokio::time::sleep(Duration::from_millis(inv.args.0)).await;
        let greeter = inv.receiver.ok_or_else(|| anyhow!("nobody to greet from"))?;
        Ok(format!("hello async from {}", greeter.name))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let later = safely_promisify(greet_later, Some(Greeter { name: "thread" }), false);
    println!("{}", later.call((10,)).await?);

    let unbound = safely_promisify(greet_async, None, false);
    println!("{}", unbound.call_on(Greeter { name: "method" }, (10,)).await?);
    if let Err(e) = unbound.call((10,)).await {
        println!("Unbound call failed: {e}");
    }

    // Errors reported from a thread pool job never reach a callback, the
    // capture scope routes them to the caller instead.
    let pool = ThreadPool::new()?;
    let fragile = safely_promisify(
        move |inv: Invocation<(), (), String, anyhow::Error>| {
            let Some(sink) = inv.sink() else {
                return Returned::Failed(anyhow!("capture is not enabled"));
            };
            pool.spawn_ok(async move {
                sink.guard(|| -> anyhow::Result<()> { Err(anyhow!("lost in the pool")) });
            });
            Returned::Callback
        },
        None,
        true,
    );
    fragile
        .call(())
        .nodeify(|r| match r {
            Ok(v) => println!("Unexpected success: {v}"),
            Err(e) => println!("Captured: {e}"),
        })
        .await;

    Ok(())
}
