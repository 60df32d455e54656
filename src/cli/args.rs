use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Drive card authorizations, captures, refunds and voids through the ledger
#[derive(Parser, Debug)]
#[command(name = "card-auth-ledger")]
#[command(
    about = "Run card authorization operations against a seeded account ledger",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV file path containing operation records
    #[arg(value_name = "OPERATIONS", help = "Path to the operations CSV file")]
    pub input_file: PathBuf,

    /// Seed file with cards, accounts and rates
    #[arg(
        long = "fixtures",
        value_name = "SEED",
        help = "Path to the JSON seed file (cards, accounts, rates)"
    )]
    pub fixtures: PathBuf,

    /// Which report to write to stdout once all operations ran
    #[arg(
        long = "report",
        value_name = "REPORT",
        default_value = "accounts",
        help = "Report to print: 'accounts' or 'authorizations'"
    )]
    pub report: ReportKind,

    /// Where exchange rates come from
    #[arg(
        long = "rate-source",
        value_name = "SOURCE",
        default_value = "fixed",
        help = "Rate source: 'fixed' uses the seed's rate table, 'http' queries the rate service"
    )]
    pub rate_source: RateSourceKind,

    /// Rate service endpoint (http rate source only)
    #[arg(
        long = "rate-url",
        value_name = "URL",
        env = "RATE_URL",
        help = "Rate service endpoint (default: seed value, then the public currconv endpoint)"
    )]
    pub rate_url: Option<String>,

    /// Rate service API key (http rate source only)
    #[arg(
        long = "rate-api-key",
        value_name = "KEY",
        env = "RATE_API_KEY",
        hide_env_values = true,
        help = "Rate service API key"
    )]
    pub rate_api_key: Option<String>,

    /// Bound on a single rate lookup
    #[arg(
        long = "conversion-timeout-ms",
        value_name = "MILLIS",
        help = "Rate lookup timeout in milliseconds (default: seed value or 2000)"
    )]
    pub conversion_timeout_ms: Option<u64>,
}

/// Reports the driver can print
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Accounts,
    Authorizations,
}

/// Available exchange rate sources
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RateSourceKind {
    Fixed,
    Http,
}
