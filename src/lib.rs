pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

pub use crate::core::config;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Commands the library can execute; the binary maps its CLI onto these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Refresh,
    Summary,
    Backfill {
        start: NaiveDate,
        end: NaiveDate,
        delay_ms: u64,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Fund flow tracker starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Refresh => cli::refresh::run(&config).await,
        AppCommand::Summary => cli::summary::run(&config),
        AppCommand::Backfill {
            start,
            end,
            delay_ms,
        } => cli::backfill::run(&config, start, end, delay_ms).await,
    }
}
