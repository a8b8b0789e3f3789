//! Command-line front end: prints the shared-followings graph of the given
//! users as JSON (or Graphviz DOT).
//!
//! ```text
//! SC_CLIENT_ID=… cumuli --page-size 200 forss flume
//! RUST_LOG=cumuli=debug cumuli --dot forss flume > graph.dot
//! ```
//!
//! Ctrl-C cancels every outstanding fetch.

use anyhow::Context;
use clap::Parser;
use cumuli::core::MapperConfig;
use cumuli::{CancellationToken, FailurePolicy, NetworkMapper, RemoteDirectory, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cumuli", version, about = "Shared-followings graph builder")]
struct Cli {
    /// Followed accounts requested per directory page
    #[arg(long, value_name = "N")]
    page_size: Option<usize>,

    /// Deadline for one user's complete fetch, 0 disables it
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Leave failed users out instead of aborting
    #[arg(long)]
    exclude_failed: bool,

    /// Print Graphviz DOT instead of JSON
    #[arg(long)]
    dot: bool,

    /// Users to map, in node order
    #[arg(required = true, value_name = "USER")]
    users: Vec<String>,
}

impl Cli {
    fn config(&self) -> anyhow::Result<MapperConfig> {
        let mut config = MapperConfig::from_env().context("reading configuration")?;

        if let Some(page_size) = self.page_size {
            config = config.with_page_size(page_size);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_fetch_timeout((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if self.exclude_failed {
            config = config.with_failure_policy(FailurePolicy::ExcludeUser);
        }
        Ok(config)
    }
}

#[cfg(feature = "http")]
fn directory(config: &MapperConfig) -> anyhow::Result<Arc<dyn RemoteDirectory>> {
    let directory = cumuli::HttpDirectory::from_config(config)?;
    Ok(Arc::new(directory))
}

#[cfg(not(feature = "http"))]
fn directory(_config: &MapperConfig) -> anyhow::Result<Arc<dyn RemoteDirectory>> {
    anyhow::bail!("cumuli was built without the `http` feature")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let users = cli
        .users
        .iter()
        .map(|raw| UserId::parse(raw))
        .collect::<cumuli::Result<Vec<_>>>()?;

    info!(
        users = users.len(),
        page_size = config.page_size(),
        failure_policy = %config.failure_policy(),
        "Mapping shared followings"
    );

    let mapper = NetworkMapper::new(directory(&config)?, config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received SIGINT, cancelling outstanding fetches");
            on_interrupt.cancel();
        }
    });

    let output = if cli.dot {
        mapper
            .shared_graph_with_cancel(&users, &cancel)
            .await?
            .to_dot()
    } else {
        mapper.build_network_map_with_cancel(&users, &cancel).await?
    };

    println!("{output}");
    Ok(())
}
