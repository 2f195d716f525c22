//! Inspector subcommands: `list`, `write` and `delete` against a running host.

use anyhow::{bail, Context, Result};
use clap::Args;
use storeview::config::TransportConfig;
use storeview::InspectorClient;

/// Address of the host to inspect.
#[derive(Args, Debug)]
pub struct Target {
    /// Host port (printed by `storeview serve` as STOREVIEW_PORT)
    #[arg(short, long)]
    pub port: u16,

    /// Host address
    #[arg(long, default_value = TransportConfig::DEFAULT_HOST)]
    pub host: String,
}

async fn connect(target: &Target) -> Result<InspectorClient> {
    let addr = tokio::net::lookup_host((target.host.as_str(), target.port))
        .await?
        .next()
        .with_context(|| format!("could not resolve {}", target.host))?;
    Ok(InspectorClient::connect(addr).await?)
}

pub async fn list(target: &Target, json: bool) -> Result<()> {
    let client = connect(target).await?;
    let entries = client.list().await?;

    if json {
        println!("{}", serde_json::to_string(&entries)?);
        return Ok(());
    }
    for (key, value) in entries {
        match value {
            Some(value) => println!("{key}\t{value}"),
            None => println!("{key}\t(unreadable)"),
        }
    }
    Ok(())
}

pub async fn write(target: &Target, key: &str, value: &str) -> Result<()> {
    let client = connect(target).await?;
    if !client.write(key, value).await? {
        bail!("host rejected write of {key}");
    }
    Ok(())
}

pub async fn delete(target: &Target, key: &str) -> Result<()> {
    let client = connect(target).await?;
    if !client.delete(key).await? {
        bail!("host rejected delete of {key}");
    }
    Ok(())
}
