// src/main.rs
mod classifier;
mod config;
mod extractors;
mod pipeline;
mod portal;
mod storage;
mod utils;

use clap::{Parser, Subcommand};
use config::{CrawlerConfig, ProxyConfig};
use std::path::PathBuf;
use std::time::Duration;
use storage::StorageManager;
use url::Url;
use utils::AppError;

/// Harvests annual statements from the Bundesanzeiger and extracts income statement figures
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the report stores and the CSV export
    #[arg(short, long, global = true, default_value = "./data")]
    output_dir: PathBuf,

    /// Debug mode - verbose logging and annotated HTML for pages that could not be read
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the portal for every worklist company and save the raw reports
    Fetch(FetchArgs),
    /// Normalize, extract and merge the raw reports
    Process,
    /// Write the processed reports as CSV
    Export,
    /// Fetch, process and export in one go
    Run(FetchArgs),
}

#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// CSV file listing the companies to search for
    #[arg(short, long)]
    worklist: PathBuf,

    /// Worklist column holding the company name
    #[arg(long, default_value = "name")]
    company_column: String,

    /// Worklist column holding the company's domain
    #[arg(long, default_value = "domain")]
    domain_column: String,

    /// ONNX model used to solve challenge images
    #[arg(short, long, default_value = "assets/model.onnx")]
    model: PathBuf,

    #[arg(long, default_value = config::DEFAULT_BASE_URL)]
    base_url: Url,

    /// Companies crawled concurrently
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Minimum spacing between requests in milliseconds (0 disables it)
    #[arg(long, default_value_t = config::DEFAULT_REQUEST_DELAY_MS)]
    delay_ms: u64,

    /// Extra attempts for requests failing on the network or with a server error
    #[arg(long, default_value_t = 0)]
    retries: u32,

    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    #[arg(long, env = "HTTP_PROXY")]
    http_proxy: Option<String>,

    #[arg(long, env = "HTTPS_PROXY")]
    https_proxy: Option<String>,

    /// Value of the portal's `cc` consent cookie
    #[arg(long, default_value = config::DEFAULT_SESSION_COOKIE)]
    session_cookie: String,
}

impl FetchArgs {
    fn crawler_config(&self, debug_dir: Option<PathBuf>) -> Result<CrawlerConfig, AppError> {
        if self.workers == 0 {
            return Err(AppError::Config("--workers must be at least 1".to_string()));
        }
        let mut config = CrawlerConfig::new(self.base_url.clone());
        config.session_cookie = self.session_cookie.clone();
        config.proxy = ProxyConfig {
            http: self.http_proxy.clone(),
            https: self.https_proxy.clone(),
        };
        config.request_delay = Duration::from_millis(self.delay_ms);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.max_retries = self.retries;
        config.workers = self.workers;
        config.debug_dir = debug_dir;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments, then setup logging (reads RUST_LOG env var)
    let args = Args::parse();
    utils::logging::setup_logging(args.debug);
    tracing::info!("Starting with args: {:?}", args);

    // 2. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;
    let debug_dir = args.debug.then(|| args.output_dir.join("debug"));

    // 3. Run the requested stages
    match &args.command {
        Command::Fetch(fetch) => {
            fetch_reports(fetch, &storage, debug_dir).await?;
        }
        Command::Process => {
            process_reports(&storage)?;
        }
        Command::Export => {
            export_reports(&storage)?;
        }
        Command::Run(fetch) => {
            fetch_reports(fetch, &storage, debug_dir).await?;
            process_reports(&storage)?;
            export_reports(&storage)?;
        }
    }

    tracing::info!("Processing complete.");
    Ok(())
}

async fn fetch_reports(args: &FetchArgs, storage: &StorageManager, debug_dir: Option<PathBuf>) -> Result<(), AppError> {
    // All three are fatal and checked before any request goes out.
    let config = args.crawler_config(debug_dir)?;
    let entries = storage::load_worklist(&args.worklist, &args.company_column, &args.domain_column)?;
    let solver = classifier::load_model(&args.model)?;
    tracing::info!("Loaded challenge model from {}", args.model.display());

    let filings = portal::client::crawl_worklist(&entries, &config, solver).await;
    tracing::info!("Harvested {} filings for {} companies", filings.len(), entries.len());

    storage.save_raw_filings(&filings)?;
    Ok(())
}

fn process_reports(storage: &StorageManager) -> Result<(), AppError> {
    let raw = storage.load_raw_filings()?;
    tracing::info!("Processing {} raw filings", raw.len());

    let records = pipeline::process_reports(raw);
    let without_statement = records.iter().filter(|r| r.no_guv).count();
    tracing::info!("{} filings after merge, {} without income statement", records.len(), without_statement);

    storage.save_processed(&records)?;
    Ok(())
}

fn export_reports(storage: &StorageManager) -> Result<(), AppError> {
    let records = storage.load_processed()?;
    if records.is_empty() {
        tracing::warn!("No processed reports to export");
    }
    storage.export_csv(&records)?;
    Ok(())
}
