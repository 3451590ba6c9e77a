//! docs: inspect and edit a document store outside the browser.
//!
//! Uses the same docs-core replica as the browser tabs, with a directory
//! holding one file per storage key.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docs_cli::{Command, execute};

#[derive(Parser, Debug)]
#[command(name = "docs")]
#[command(about = "Local CRDT document store")]
struct Args {
    /// Directory holding the store
    #[arg(short, long, default_value = "docs-store")]
    store: PathBuf,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Respects RUST_LOG, defaults to warn (or debug with --verbose)
    let default_filter = if args.verbose {
        "debug,docs_core=debug,docs_cli=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    for line in execute(args.store, args.command).await? {
        println!("{}", line);
    }
    Ok(())
}
