//! Tag gateway service entry point

use clap::Parser;
use std::path::PathBuf;
use tagsrv::{GatewayConfig, TagGateway};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tagsrv", about = "Modbus tag acquisition gateway")]
struct Args {
    /// Gateway configuration file (YAML)
    #[arg(short, long, default_value = "gateway.yaml")]
    config: PathBuf,

    /// Override the tag table path from the configuration
    #[arg(long)]
    tags: Option<PathBuf>,

    /// Validate configuration and the tag table, then exit
    #[arg(long)]
    validate: bool,

    /// Log filter, e.g. "debug" or "tagsrv=trace"
    #[arg(long, env = "TAGSRV_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = GatewayConfig::from_file(&args.config)?;
    if let Some(tags) = args.tags {
        config.tag_table = tags;
    }

    info!(
        config = %args.config.display(),
        tag_table = %config.tag_table.display(),
        slaves = config.slaves.len(),
        "starting tag gateway"
    );

    let gateway = TagGateway::new(config);
    let tag_count = gateway.load_tags().await?;
    info!(tags = tag_count, "tag table loaded");

    if args.validate {
        let status = gateway.status().await;
        println!("{}", serde_json::to_string_pretty(&status)?);
        info!("validation completed successfully");
        return Ok(());
    }

    gateway.start().await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");

    gateway.shutdown().await;
    Ok(())
}
