//! Ticker - subscribe to a price topic and print every tick.
//!
//! This example demonstrates:
//! - Building a registry with a custom heartbeat interval
//! - Typed topics decoded with MessagePack
//! - Reporting terminal session errors
//!
//! Run `cargo run --example publisher` first, then:
//!
//! ```bash
//! RUST_LOG=subwire_client=debug cargo run --example ticker -- ACME
//! ```

use std::time::Duration;

use serde::Deserialize;
use subwire_client::{SubscriptionError, SubscriptionRegistry, Topic};
use tracing_subscriber::EnvFilter;

#[derive(Deserialize, Debug)]
struct Tick {
    symbol: String,
    price: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let symbol = std::env::args().nth(1).unwrap_or_else(|| "ACME".to_string());
    let endpoint = "127.0.0.1:9000".parse()?;

    let registry = SubscriptionRegistry::builder()
        .heartbeat_interval(Duration::from_secs(5))
        .build();

    let topic: Topic<String, Tick> = Topic::new("prices", symbol);
    registry.subscribe_with_error(
        endpoint,
        topic,
        |tick: Tick| println!("{} @ {}", tick.symbol, tick.price),
        |err: &SubscriptionError| eprintln!("subscription ended: {}", err),
    )?;

    tokio::signal::ctrl_c().await?;
    registry.shutdown();
    Ok(())
}
