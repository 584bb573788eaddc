//! redismap - replication topology report for Redis fleets
//!
//! Reads cluster membership from etcd, probes every member with
//! `INFO replication` and prints a JSON report of roles, replicas and lag.

use anyhow::{bail, Context, Result};
use clap::Parser;
use redismap::{ClusterMapBuilder, Config};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Replication topology report for Redis clusters registered in etcd
#[derive(Parser, Debug)]
#[command(name = "redismap")]
#[command(author = "Jerry")]
#[command(version)]
#[command(about = "Show Redis masters, their replicas and replication lag", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML, default: ~/.redismap/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cluster key to report on; repeatable, replaces the configured list
    #[arg(short = 'k', long = "cluster-key")]
    cluster_keys: Vec<String>,

    /// etcd endpoint; repeatable, replaces the configured list
    #[arg(short, long = "etcd")]
    etcd_endpoints: Vec<String>,

    /// Abandon unfinished probes after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Print the report on a single line
    #[arg(long)]
    compact: bool,
}

/// Load the configuration file and apply command line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from '{}'", path.display()))?,
        None => match Config::default_path().filter(|p| p.exists()) {
            Some(path) => Config::load(&path)
                .with_context(|| format!("loading configuration from '{}'", path.display()))?,
            None => Config::default(),
        },
    };

    if !cli.cluster_keys.is_empty() {
        config.clusters.keys = cli.cluster_keys.clone();
    }
    if !cli.etcd_endpoints.is_empty() {
        config.etcd.endpoints = cli.etcd_endpoints.clone();
    }
    config.validate()?;

    if config.clusters.keys.is_empty() {
        bail!("no cluster keys configured; set [clusters] keys or pass --cluster-key");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    redismap::observability::init_logging(&config.logging.to_log_config()?)?;

    let builder = ClusterMapBuilder::from_config(&config)?;
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with partial results");
            on_interrupt.cancel();
        }
    });

    if let Some(secs) = cli.deadline_secs {
        let on_deadline = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            warn!("Deadline of {}s reached, finishing with partial results", secs);
            on_deadline.cancel();
        });
    }

    info!(
        "Reporting on {} cluster key(s) via {}",
        config.clusters.keys.len(),
        config.etcd.endpoints.join(", ")
    );
    let outcome = builder.build(&config.clusters.keys, &cancel).await;

    for (key, reason) in &outcome.discovery_errors {
        warn!("Cluster '{}' left out of the report: {}", key, reason);
    }
    for (key, address) in outcome.masters_without_replicas() {
        warn!("Master {} in '{}' has no replicas", address, key);
    }
    info!("Probed {} host(s)", outcome.host_count());

    let rendered = if cli.compact {
        serde_json::to_string(&outcome.report)?
    } else {
        serde_json::to_string_pretty(&outcome.report)?
    };
    println!("{}", rendered);

    Ok(())
}
