use anyhow::Context;
use brewbus::{init_logging, AppConfig, BrewRequest, Brewery, Money};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Order a coffee through the event bus
///
/// Prints the brew result as JSON. Exit status: 2 for configuration
/// problems, 3 unknown coffee, 4 insufficient funds, 5 change cannot be
/// paid, 6 malformed request, 7 timed out, 1 anything else.
#[derive(Parser)]
#[command(
    name = "brewbus",
    version = brewbus::VERSION,
    long_version = brewbus::LONG_VERSION
)]
struct Cli {
    /// Path to a .toml or .json config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Coffee to brew
    coffee: String,

    /// Amount paid, e.g. 2.10
    money: Money,

    /// Give up waiting for the brew after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load_or_default(&AppConfig::default_path()?)?,
    };

    let brewery = Brewery::new(&config)?;

    let request = BrewRequest::new(cli.coffee, cli.money);
    let outcome = brewery
        .order(request, cli.timeout_ms.map(Duration::from_millis))
        .await;
    brewery.shutdown().await;

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Order failed: {}", e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}
