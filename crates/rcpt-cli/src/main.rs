//! `rcpt`: turn OCR'd grocery receipt text into priced line items.
//!
//! Logs go to stderr so that extraction output on stdout stays pipeable.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, extract, patterns};

/// Read receipt text produced by an OCR engine and print its line items
/// (name, unit price, quantity, subtotal) with per-item confidence
#[derive(Parser)]
#[command(name = "rcpt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Raise log detail on stderr: -v info, -vv debug, -vvv per-pattern trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON config file [default: <config dir>/rcpt/config.json, built-in defaults if absent]
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract line items from one receipt text file, or stdin with `-`, as json, csv or text
    Extract(extract::ExtractArgs),

    /// Extract every file matched by a glob, writing one output per receipt
    Batch(batch::BatchArgs),

    /// List the patterns a vendor hint would try, vendor-specific first
    Patterns(patterns::PatternsArgs),

    /// Inspect or edit the config file (show, init, get, set, path)
    Config(config::ConfigArgs),
}

/// Stderr log level for a `-v` count. Warnings are always shown.
fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Extract(args) => extract::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Patterns(args) => patterns::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
