mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::analyze::{AnalyzeArgs, ValidateArgs};

/// Liquidity manipulation screening for company financial statements
#[derive(Parser)]
#[command(
    name = "lrd",
    version,
    about = "Liquidity manipulation screening for company financial statements",
    long_about = "Reads a CSV or .xlsx table of company-year financial statements, computes \
                  liquidity ratios, raises DSO / trade-coverage / cash-profit red flags, \
                  scores each row with an isolation-forest anomaly model, and blends both \
                  into a High / Medium / Low liquidity risk bucket."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a financial statements table and optionally write the augmented table
    Analyze(AnalyzeArgs),
    /// Check a table for required columns and parseable values
    Validate(ValidateArgs),
    /// List the AI / flag weight scenarios
    Scenarios,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Analyze(args) => commands::analyze::run_analyze(args),
        Commands::Validate(args) => commands::analyze::run_validate(args),
        Commands::Scenarios => commands::scenarios::run_scenarios(),
        Commands::Version => {
            println!("lrd {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
