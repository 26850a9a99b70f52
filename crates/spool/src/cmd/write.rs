//! Write command - Feed newline-delimited JSON into a spool writer
//!
//! # Usage
//!
//! ```bash
//! producer | spool write --config spool.toml
//! spool write events.ndjson --config spool.toml --path /tmp/events.spl
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use spool_writer::{Publisher, WriterConfig};

/// Write command arguments
#[derive(Args, Debug, Default)]
pub struct WriteArgs {
    /// Input file of JSON lines (stdin if omitted)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Live output file, overriding the configured path
    #[arg(long)]
    path: Option<PathBuf>,
}

/// Counts of input lines
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    pub published: u64,
    pub skipped: u64,
}

/// Run the write command
pub fn run(config_path: &Path, args: WriteArgs) -> Result<()> {
    let mut config = WriterConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if let Some(path) = args.path {
        config.path = path;
    }

    let mut publisher = spool_writer::start::<Value>(&config)
        .with_context(|| format!("failed to start writer on {}", config.path.display()))?;

    let stats = match &args.input {
        Some(input) => {
            let file = File::open(input)
                .with_context(|| format!("failed to open {}", input.display()))?;
            publish_lines(BufReader::new(file), &mut publisher)
        }
        None => publish_lines(io::stdin().lock(), &mut publisher),
    };

    // Close even if reading failed part way
    let snapshot = publisher.close();
    let stats = stats?;

    tracing::info!(
        published = stats.published,
        skipped = stats.skipped,
        records_written = snapshot.records_written,
        write_errors = snapshot.write_errors,
        rollovers = snapshot.rollovers,
        rollover_failures = snapshot.rollover_failures,
        "write finished"
    );
    Ok(())
}

/// Publish every JSON line of `input`; blank and malformed lines are skipped
pub fn publish_lines(input: impl BufRead, publisher: &mut Publisher<Value>) -> Result<LineStats> {
    let mut stats = LineStats::default();

    for (number, line) in input.lines().enumerate() {
        let line = line.context("failed to read input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(record) => {
                publisher.publish(record);
                stats.published += 1;
            }
            Err(e) => {
                stats.skipped += 1;
                tracing::warn!(line = number + 1, error = %e, "skipping malformed JSON line");
            }
        }
    }
    Ok(stats)
}
