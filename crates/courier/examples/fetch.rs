//! Courier fetch example
//!
//! Sends a GET with query parameters, a JSON POST, and a request that is
//! canceled right away, then waits for all three outcomes.
//!
//! Run with: RUST_LOG=courier_net=debug cargo run -p courier --example fetch

use std::sync::mpsc;
use std::time::Duration;

use courier::{AsyncHttpClient, Outcome, QueryParams, ThreadPoolConfig};
use tracing_subscriber::EnvFilter;

fn report(label: &str, outcome: Outcome) {
    match outcome {
        Outcome::Succeeded {
            code, status, body, ..
        } => {
            tracing::info!("{label}: {code} {}", status.unwrap_or_default());
            tracing::info!("{label}: {} bytes of body", body.len());
        }
        Outcome::Failed { code, status, cause } => {
            tracing::warn!("{label}: failed with {code} {status:?}: {cause:?}");
        }
        Outcome::Canceled => tracing::info!("{label}: canceled"),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,courier_net=debug")),
        )
        .init();

    let client = AsyncHttpClient::builder()
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(5))
        .pool(ThreadPoolConfig::with_threads(2, 4))
        .build()?;

    let (tx, rx) = mpsc::channel::<(&'static str, Outcome)>();

    let params = QueryParams::new().with("q", "a b").with("page", "1");
    let get_tx = tx.clone();
    client.get_with("https://httpbin.org/get", None, Some(&params), move |outcome: Outcome| {
        let _ = get_tx.send(("GET", outcome));
    });

    let post_tx = tx.clone();
    client.post_json(
        "https://httpbin.org/post",
        None,
        &serde_json::json!({"name": "John", "age": 42}),
        move |outcome: Outcome| {
            let _ = post_tx.send(("POST", outcome));
        },
    );

    let cancel_tx = tx;
    let handle = client.get("https://httpbin.org/delay/3", move |outcome: Outcome| {
        let _ = cancel_tx.send(("CANCELED GET", outcome));
    });
    tracing::info!("Canceling request {}", handle.id());
    handle.cancel();

    for _ in 0..3 {
        let (label, outcome) = rx.recv_timeout(Duration::from_secs(15))?;
        report(label, outcome);
    }
    Ok(())
}
