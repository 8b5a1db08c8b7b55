/// # Offloading Example
///
/// Deploys a few catalog functions onto a pool and calls them concurrently.
///
/// - Functions declared with `#[deployable]` and with closures
/// - Concurrent calls spread round-robin over the unit threads
/// - A failing call next to successful ones
///
/// Run with `RUST_LOG=weft=debug` for per-unit registration events.

use std::time::Duration;

use futures::future::join_all;
use tracing::info;

use weft::{args, deployable, logging, FunctionCatalog, FunctionDefinition, PoolConfig, PoolContext};

/// Naive, so each call keeps its unit busy for a while
#[deployable]
fn fibonacci(n: u64) -> u64 {
    if n < 2 { n } else { fibonacci(n - 1) + fibonacci(n - 2) }
}

#[deployable]
async fn delayed_echo(text: String, millis: u64) -> String {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    text
}

#[deployable]
fn sqrt(x: f64) -> Result<f64, String> {
    if x < 0.0 {
        return Err(format!("{} has no real square root", x));
    }
    Ok(x.sqrt())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_development();

    let catalog = FunctionCatalog::new()
        .with::<FibonacciFn>()
        .with::<DelayedEchoFn>()
        .with::<SqrtFn>()
        .with_fn("thread_name", 0, |_| {
            Ok(std::thread::current().name().unwrap_or("unnamed").into())
        });

    let pool = PoolContext::create(PoolConfig::with_size(4), catalog).await?;
    info!(pool = %pool.id(), units = pool.size(), "pool ready");

    let fibonacci = pool.deploy::<FibonacciFn>().await?;
    let results = join_all((25..33).map(|n| fibonacci.call_as::<u64>(args![n]))).await;
    for (n, result) in (25..33).zip(results) {
        let value = result?;
        info!("fibonacci({}) = {}", n, value);
    }

    let echo = pool.deploy::<DelayedEchoFn>().await?;
    let words = ["slow", "steady", "wins"];
    let echoed = join_all(words.iter().map(|word| echo.call_as::<String>(args![word, 100]))).await;
    info!(?echoed, "echo finished");

    let sqrt = pool.deploy::<SqrtFn>().await?;
    match sqrt.call(args![-4.0]).await {
        Ok(value) => info!(%value, "unexpected root"),
        Err(e) => info!(error = %e, "negative input rejected"),
    }
    let root = sqrt.call_as::<f64>(args![16.0]).await?;
    info!(root, "sqrt(16)");

    let thread_name = pool
        .deploy_function(FunctionDefinition::named("thread_name", 0))
        .await?;
    for _ in 0..pool.size() {
        let thread = thread_name.call_as::<String>(args![]).await?;
        info!(%thread, "served by");
    }

    pool.destroy().await?;
    Ok(())
}
