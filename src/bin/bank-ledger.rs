use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use bank_ledger::{
    bin_utils::{Service, ServiceError},
    config::BankConfig,
    coordinator::ErrorKind,
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Runs a CSV batch of banking operations and prints the resulting accounts.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// CSV file with `op,account,counterparty,amount,secret` rows
    file: PathBuf,
    /// JSON file overriding timeouts and retry bounds
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => BankConfig::load(path)
            .with_context(|| format!("Failed to load config `{}`", path.display()))?,
        None => BankConfig::default(),
    };
    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open `{}`", args.file.display()))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line, err| match err {
            // declined payments are business outcomes, not failures of the batch
            ServiceError::Bank(err) if err.kind() == ErrorKind::InsufficientFunds => {
                tracing::debug!(line, %err, "operation declined")
            }
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run()
}
