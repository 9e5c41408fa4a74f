//! parcelbay-av - Address Verification service
//!
//! Operational entry point: verify a single address from command-line
//! flags, or a batch of records from a JSON file. All verification logic
//! lives in the library; this binary only loads configuration, initializes
//! tracing, and prints JSON results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parcelbay_av::{
    Address, BatchEntry, BulkRunner, RecordResult, VerificationChain, VerifierConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "parcelbay-av", about = "Parcelbay address verification")]
struct Cli {
    /// Path to the config file (default: platform config directory)
    #[arg(long, env = "PARCELBAY_AV_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a single address
    Verify {
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        street1: String,
        #[arg(long)]
        street2: Option<String>,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        zip: String,
    },
    /// Verify a batch of records from a JSON file
    ///
    /// The file holds an array of `{record_id, slot, address}` entries.
    Batch {
        /// Path to the batch JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting parcelbay-av (Address Verification)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let config = VerifierConfig::load(cli.config.as_deref())?;
    let chain = Arc::new(VerificationChain::from_config(&config));

    match cli.command {
        Command::Verify {
            name,
            street1,
            street2,
            city,
            state,
            zip,
        } => {
            let address = Address {
                name,
                company: None,
                street1,
                street2,
                city,
                state,
                postal_code: zip,
                country: "US".to_string(),
            };

            let outcome = chain.verify(&address).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Batch { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading batch file {}", file.display()))?;
            let entries: Vec<BatchEntry> = serde_json::from_str(&content)
                .with_context(|| format!("parsing batch file {}", file.display()))?;

            let runner = BulkRunner::new(chain, config.bulk.clone());
            let batch = runner
                .run(entries)
                .await
                .context("running batch verification")?;

            let records: Vec<serde_json::Value> = batch
                .results
                .iter()
                .map(|((record_id, slot), result)| {
                    let (kind, detail) = match result {
                        RecordResult::Outcome(outcome) => {
                            ("outcome", serde_json::to_value(outcome))
                        }
                        RecordResult::NotAttempted { reason } => {
                            ("not_attempted", serde_json::to_value(reason))
                        }
                    };
                    serde_json::json!({
                        "record_id": record_id,
                        "slot": slot,
                        "kind": kind,
                        "result": detail.unwrap_or(serde_json::Value::Null),
                    })
                })
                .collect();

            let report = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "summary": batch.summary,
                "records": records,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
