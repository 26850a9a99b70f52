//! Spool - Rotating container-file writer
//!
//! # Usage
//!
//! ```bash
//! # Write newline-delimited JSON from stdin (default)
//! producer | spool --config spool.toml
//! spool write events.ndjson --config spool.toml
//!
//! # Inspect container files
//! spool cat /var/spool/events-2024-03-10.0.log
//! spool schema /var/spool/events.spl
//! ```

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Spool - Rotating container-file writer
#[derive(Parser, Debug)]
#[command(name = "spool")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, default_value = "spool.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write newline-delimited JSON records through the writer
    Write(cmd::write::WriteArgs),

    /// Print the records of a container file as JSON lines
    Cat(cmd::cat::CatArgs),

    /// Print the schema embedded in a container file
    Schema(cmd::schema::SchemaArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Command::Write(args)) => cmd::write::run(&cli.config, args),
        Some(Command::Cat(args)) => cmd::cat::run(args),
        Some(Command::Schema(args)) => cmd::schema::run(args),
        // No subcommand = write stdin
        None => cmd::write::run(&cli.config, cmd::write::WriteArgs::default()),
    }
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr so they never mix with `cat` output.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();

    Ok(())
}
