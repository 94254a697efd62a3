//! Fetch products with one simulated network failure, then retry.
//!
//! Run with `RUST_LOG=statechart=debug` to see transitions and invocations.

use statechart::products::{product_machine, FetchState, Product, FETCH, RETRY};
use statechart::{Interpreter, InterpreterOptions, Snapshot, State};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let machine = product_machine(move || {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if attempt == 0 {
                Err("network down".to_string())
            } else {
                Ok(vec![
                    Product::titled("Desk Lamp"),
                    Product::titled("Standing Desk"),
                ])
            }
        }
    })?;

    let interpreter =
        Interpreter::with_options(machine, InterpreterOptions::new().log_snapshots(true));
    let (tx, mut rx) = mpsc::unbounded_channel();
    interpreter.subscribe(move |snapshot: &Snapshot<_, _>| {
        let _ = tx.send(snapshot.clone());
    });

    interpreter.start()?;
    interpreter.send(FETCH)?;

    while let Some(snapshot) = rx.recv().await {
        println!("{}", serde_json::to_string(&snapshot)?);

        match snapshot.value {
            FetchState::Error => {
                println!("fetch failed, retrying");
                interpreter.send(RETRY)?;
            }
            FetchState::Success => break,
            FetchState::Idle | FetchState::Loading => {}
        }
    }

    for transition in interpreter.history().transitions() {
        println!(
            "{} -> {} on {}",
            transition.from.name(),
            transition.to.name(),
            transition.event
        );
    }
    println!("fetch attempts: {}", attempts.load(Ordering::SeqCst));

    interpreter.stop();
    Ok(())
}
