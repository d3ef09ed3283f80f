mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::capital_budgeting::InvestmentArgs;
use commands::derivatives::OptionArgs;
use commands::engine::EvaluateArgs;
use commands::fixed_income::BondArgs;
use commands::lending::{CompareLoansArgs, LoanArgs};
use commands::ratios::RatiosArgs;
use commands::valuation::DcfArgs;

/// Corporate finance calculations with decimal precision
#[derive(Parser)]
#[command(
    name = "fincash",
    version,
    about = "Corporate finance calculations with decimal precision",
    long_about = "A CLI for corporate finance calculations with decimal precision. \
                  Supports DCF valuation, investment budgeting (NPV, IRR, payback), \
                  loan amortization, Black-Scholes option pricing, bond pricing \
                  and financial ratio analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Emit debug logs from the calculation engine on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Discounted Cash Flow valuation
    Dcf(DcfArgs),
    /// Evaluate an investment project (NPV, IRR, payback, PI)
    Investment(InvestmentArgs),
    /// Build a loan amortization schedule
    Loan(LoanArgs),
    /// Compare constant, linear and in-fine repayment of the same loan
    CompareLoans(CompareLoansArgs),
    /// Price a European option with Black-Scholes
    Option(OptionArgs),
    /// Price a fixed-coupon bond
    Bond(BondArgs),
    /// Analyse financial ratios and compute a health score
    Ratios(RatiosArgs),
    /// Evaluate any model by name from a parameter mapping
    Evaluate(EvaluateArgs),
    /// List available models and their parameters
    Models,
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

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,fincash_core=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Dcf(args) => commands::valuation::run_dcf(args),
        Commands::Investment(args) => commands::capital_budgeting::run_investment(args),
        Commands::Loan(args) => commands::lending::run_loan(args),
        Commands::CompareLoans(args) => commands::lending::run_compare_loans(args),
        Commands::Option(args) => commands::derivatives::run_option(args),
        Commands::Bond(args) => commands::fixed_income::run_bond(args),
        Commands::Ratios(args) => commands::ratios::run_ratios(args),
        Commands::Evaluate(args) => commands::engine::run_evaluate(args),
        Commands::Models => commands::engine::run_models(),
        Commands::Version => {
            println!("fincash {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    let rendered = result.and_then(|value| output::format_output(&cli.output, &value));

    match rendered {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
