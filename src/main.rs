//! Card Authorization Ledger CLI
//!
//! Command-line driver that seeds the ledger from a fixture file, runs the
//! operations of a CSV file through the authorization engine and prints a
//! report of the final state.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --fixtures seed.json operations.csv > accounts.csv
//! cargo run -- --fixtures seed.json --report authorizations operations.csv
//! RATE_API_KEY=... cargo run -- --fixtures seed.json --rate-source http operations.csv
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` (default `info`) to change verbosity.
//!
//! # Exit Codes
//!
//! - 0: Success (individual rejected operations do not change the exit code)
//! - 1: Error (invalid seed, file not found, report could not be written, etc.)

use card_auth_ledger::cli::{self, CliArgs, RateSourceKind};
use card_auth_ledger::config::AppConfig;
use card_auth_ledger::core::{HttpRateSource, RateSource, DEFAULT_RATE_URL};
use card_auth_ledger::driver::{bootstrap, OperationDriver};
use card_auth_ledger::io::OperationReader;
use card_auth_ledger::PaymentError;
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: CliArgs) -> Result<(), PaymentError> {
    let config = AppConfig::load(&args.fixtures)?;

    let conversion_timeout = args
        .conversion_timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.conversion_timeout());

    let rate_source: Arc<dyn RateSource> = match args.rate_source {
        RateSourceKind::Fixed => Arc::new(config.fixed_rate_source()),
        RateSourceKind::Http => {
            let url = args
                .rate_url
                .clone()
                .or_else(|| config.rate_url.clone())
                .unwrap_or_else(|| DEFAULT_RATE_URL.to_string());
            let api_key = args
                .rate_api_key
                .clone()
                .or_else(|| config.rate_api_key.clone())
                .unwrap_or_default();
            Arc::new(HttpRateSource::new(url, api_key, conversion_timeout)?)
        }
    };

    let today = chrono::Utc::now().date_naive();
    let engine = bootstrap(&config, rate_source, conversion_timeout, today).await?;

    let reader = OperationReader::open(&args.input_file)?;
    let mut driver = OperationDriver::new(Arc::new(engine));
    driver.run(reader).await;

    let mut report = Vec::new();
    driver.write_report(args.report, &mut report).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&report)?;
    stdout.flush()?;
    Ok(())
}
