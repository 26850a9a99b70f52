//! Schema command - Print the schema embedded in a container file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use spool_container::read_schema;

/// Schema command arguments
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Container file (live or archived)
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

/// Run the schema command
pub fn run(args: SchemaArgs) -> Result<()> {
    let schema = read_schema(&args.file)
        .with_context(|| format!("failed to read schema of {}", args.file.display()))?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
