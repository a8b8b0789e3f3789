//! Shared-followings graph over an in-memory directory
//!
//! Simulates a slow directory with per-user latency so the completion order
//! differs from the request order, then prints the graph as JSON and DOT.
//!
//! Run with:
//! ```text
//! RUST_LOG=cumuli=debug cargo run --example in_memory_network
//! ```

use cumuli::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let directory = Arc::new(
        InMemoryDirectory::new()
            .with_user("forss", ["flume", "kaytranada", "bonobo", ""])
            .with_user("flume", ["kaytranada", "chet-faker", "bonobo"])
            .with_user("odesza", ["bonobo", "chet-faker", "tycho"])
            .with_latency("forss", Duration::from_millis(300))
            .with_latency("flume", Duration::from_millis(50))
            .with_latency("odesza", Duration::from_millis(150)),
    );

    let config = MapperConfig::default().with_page_size(2);
    let mapper = NetworkMapper::new(directory.clone(), config)
        .with_cache(Arc::new(InMemoryResultCache::new()));

    let users = NetworkMapper::parse_request("forss flume odesza")?;
    let json = mapper.build_network_map(&users).await?;
    println!("{json}");

    let graph = Graph::from_json(&json)?;
    println!("{}", graph.to_dot());

    println!(
        "{} count queries, {} page queries",
        directory.count_queries(),
        directory.page_queries()
    );
    Ok(())
}
