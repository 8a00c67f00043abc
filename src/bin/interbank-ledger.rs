use std::fs::File;

use anyhow::{Context, Result};
use interbank_ledger::{bin_utils::ScriptRunner, network::in_memory_network::InMemoryNetwork};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("interbank_ledger=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let filename = std::env::args()
        .nth(1)
        .context("Expected a script file name as the first argument")?;
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let runner = ScriptRunner {
        input: file,
        output: &mut std::io::stdout(),
        network: InMemoryNetwork::default(),
        error_printer: Box::new(|line, err| eprintln!("Error at line {line}: {err:#}")),
    };
    runner.run()?;
    Ok(())
}
