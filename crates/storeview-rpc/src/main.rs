//! Storeview command line.
//!
//! `storeview serve` hosts a key-value store behind the inspector bridge on a
//! TCP port. `storeview list|write|delete` act as the inspector against a
//! running host.

mod inspect;
mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "storeview")]
#[command(about = "Expose a key-value store to an inspector, or inspect one")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve a store to inspectors until interrupted
    Serve(serve::ServeArgs),

    /// List every entry of a running host's store
    List {
        #[command(flatten)]
        target: inspect::Target,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },

    /// Write a string value
    Write {
        #[command(flatten)]
        target: inspect::Target,

        key: String,
        value: String,
    },

    /// Delete a key
    Delete {
        #[command(flatten)]
        target: inspect::Target,

        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the port line and command output.
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match args.command {
        Command::Serve(serve_args) => serve::run(serve_args).await,
        Command::List { target, json } => inspect::list(&target, json).await,
        Command::Write { target, key, value } => inspect::write(&target, &key, &value).await,
        Command::Delete { target, key } => inspect::delete(&target, &key).await,
    }
}
