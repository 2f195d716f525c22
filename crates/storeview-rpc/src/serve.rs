//! `storeview serve`: host a store behind the inspector bridge.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use storeview::config::TransportConfig;
use storeview::{KeyValueStore, MemoryStore, SqliteStore, StoreBridge, TcpTransport};
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = TransportConfig::DEFAULT_HOST)]
    pub host: String,

    /// SQLite database backing the store (default: in-memory)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Entry written before serving, as KEY=VALUE (repeatable)
    #[arg(long = "seed", value_parser = parse_seed)]
    pub seeds: Vec<(String, String)>,
}

/// Parse a `KEY=VALUE` seed entry.
fn parse_seed(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in '{raw}'")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

fn open_store(args: &ServeArgs) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match &args.db {
        Some(path) => {
            info!("Serving SQLite store at {}", path.display());
            Arc::new(
                SqliteStore::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?,
            )
        }
        None => {
            info!("Serving in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    for (key, value) in &args.seeds {
        store.set_string(key, value)?;
    }
    Ok(store)
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let store = open_store(&args)?;
    let transport = Arc::new(TcpTransport::bind(&args.host, args.port).await?);

    let mut bridge = StoreBridge::builder()
        .shared_store(store)
        .error_handler(|err| warn!("Inspector request failed: {}", err))
        .build();
    bridge.activate(transport.clone())?;

    // Print port for the launching process to read (intentional stdout)
    println!("STOREVIEW_PORT={}", transport.port());
    info!("Storeview host running on {}", transport.addr());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    let failures = bridge.deactivate();
    if failures > 0 {
        warn!("{} listeners failed to release", failures);
    }
    Ok(())
}
