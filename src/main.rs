use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use fundflow::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fundflow::AppCommand {
    fn from(cmd: Commands) -> fundflow::AppCommand {
        match cmd {
            Commands::Refresh => fundflow::AppCommand::Refresh,
            Commands::Summary => fundflow::AppCommand::Summary,
            Commands::Backfill {
                start,
                end,
                delay_ms,
            } => fundflow::AppCommand::Backfill {
                start,
                end: end.unwrap_or_else(|| (Utc::now() - Duration::days(1)).date_naive()),
                delay_ms,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Scrape shares outstanding, recompute fund flows, write artifacts
    Refresh,
    /// Display the latest flow summary per ticker
    Summary,
    /// Backfill historical shares outstanding from iShares
    Backfill {
        /// First date to backfill (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last date to backfill, defaults to yesterday (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Delay between requests in milliseconds
        #[arg(long, default_value_t = 1500)]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fundflow::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = fundflow::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
tickers:
  - symbol: "EWY"
    ishares_product_id: "239681"
    ishares_name: "ishares-msci-south-korea-etf"

providers:
  yahoo:
    base_url: "https://query1.finance.yahoo.com"
  ishares:
    base_url: "https://www.ishares.com/us"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
