//! Cat command - Print the records of a container file
//!
//! # Usage
//!
//! ```bash
//! spool cat events-2024-03-10.0.log           # one JSON object per line
//! spool cat events.spl --limit 10
//! ```

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spool_container::ContainerReader;

/// Cat command arguments
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Container file (live or archived)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Stop after this many records
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

/// Run the cat command
pub fn run(args: CatArgs) -> Result<()> {
    let reader = ContainerReader::open(&args.file)
        .with_context(|| format!("failed to open {}", args.file.display()))?;

    let mut out = BufWriter::new(io::stdout().lock());
    let limit = args.limit.unwrap_or(usize::MAX);

    for record in reader.records().take(limit) {
        let record = record
            .with_context(|| format!("failed to read record from {}", args.file.display()))?;
        writeln!(out, "{}", record)?;
    }

    out.flush()?;
    Ok(())
}
