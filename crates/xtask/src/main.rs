//! Development tasks for the ability runtime
//!
//! This binary provides development utilities using the cargo-xtask pattern.
//! Run with: `cargo xtask <command>`

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{DecodeMessage, Simulate};

/// Development tasks for the ability runtime
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tools for replicated abilities", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Run a RON scenario across an authority and its clients
    Simulate(Simulate),

    /// Decode a hex-encoded replication message
    DecodeMessage(DecodeMessage),
}

fn main() -> Result<()> {
    // Load .env file if it exists (for RUST_LOG and other env vars)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(cmd) => cmd.execute(),
        Command::DecodeMessage(cmd) => cmd.execute(),
    }
}
