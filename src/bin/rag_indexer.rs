use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use tomi_backend::config::AppConfig;
use tomi_backend::rag::providers::ProviderIdentity;
use tomi_backend::rag::RagService;

#[derive(Parser, Debug)]
#[command(name = "rag-indexer")]
#[command(about = "Ingest a directory of PDFs into the provider-scoped vector index")]
struct Args {
    /// Directory of PDF files (defaults to TOMI_DATA_DIR)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Provider identity: remote or local (defaults to TOMI_PROVIDER)
    #[arg(long, value_parser = parse_provider)]
    provider: Option<ProviderIdentity>,

    /// Directory holding the index and ledger (defaults to TOMI_INDEX_ROOT)
    #[arg(long)]
    index_root: Option<PathBuf>,
}

fn parse_provider(value: &str) -> Result<ProviderIdentity, String> {
    match value {
        "remote" => Ok(ProviderIdentity::Remote),
        "local" => Ok(ProviderIdentity::Local),
        other => Err(format!("unknown provider '{}', expected remote or local", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(dir) = args.dir {
        config.data_dir = dir;
    }
    if let Some(provider) = args.provider {
        config.provider = provider;
    }
    if let Some(root) = args.index_root {
        config.index_root = root;
    }

    println!("Provider:  {}", config.provider);
    println!("Source:    {}", config.data_dir.display());
    println!("Index:     {}", config.index_dir().display());
    println!("Ledger:    {}", config.ledger_path().display());

    let rag = RagService::from_config(&config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message("ingesting...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    rag.ingest(&config.data_dir).await;

    spinner.finish_with_message("done");

    let status = rag.status().await;
    println!("\nIngestion complete!");
    println!("  Ingested this run: {}", status.ingested_this_run.len());
    println!("  Failed:            {}", status.failed_files.len());
    println!("  Files in ledger:   {}", status.total_files_processed);
    println!("  Index entries:     {}", status.total_entries);

    if !status.failed_files.is_empty() {
        println!("\nFailed files (will be retried next run):");
        for name in &status.failed_files {
            println!("  {}", name);
        }
    }

    Ok(())
}
