//! Watch a config file and print every accepted version.
//!
//! Edit the file while this runs; invalid edits are logged and ignored.
//!
//! ```text
//! cargo run --example watch -- --config demos/server.toml --debounce-ms 250
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ruleconf::{Loader, Record, WatchOptions, Watcher};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "watch")]
#[command(about = "Hot-reload a config file", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "demos/server.toml")]
    config: PathBuf,

    /// Quiet period before a change is reloaded
    #[arg(short, long, default_value_t = 100)]
    debounce_ms: u64,
}

#[derive(Debug, Deserialize, Record)]
struct ServerConfig {
    #[validate("required")]
    host: String,
    #[validate("required,min=1,max=65535")]
    port: u32,
    #[validate("oneof=dev|staging|prod")]
    env: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ruleconf=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let options = WatchOptions {
        debounce: Duration::from_millis(cli.debounce_ms),
        ..WatchOptions::default()
    };

    let watcher = Watcher::start(
        &cli.config,
        options,
        Loader::new(),
        |config: Arc<ServerConfig>| {
            tracing::info!(
                host = %config.host,
                port = config.port,
                env = %config.env,
                "Configuration applied"
            );
        },
    )?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down");

    watcher.shutdown().await;
    Ok(())
}
