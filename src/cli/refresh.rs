//! The batch pipeline run: scrape, fetch, compute, write
//!
//! Tickers are independent, so the fetch-and-compute stage fans out
//! concurrently. Failures are contained per ticker: a skipped ticker logs a
//! warning, leaves any previous artifact on disk, and the run carries on.

use crate::cli::ui;
use crate::core::cache::Cache;
use crate::core::config::{AppConfig, TickerConfig};
use crate::core::report::{self, FundReport, SkipReason};
use crate::core::source::{FundProfileProvider, PriceHistoryProvider, SharesHistoryProvider};
use crate::providers::ishares::ISharesProvider;
use crate::providers::yahoo_finance::{YahooPriceProvider, YahooProfileProvider};
use crate::store::SharesHistoryStore;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub async fn run(config: &AppConfig) -> Result<()> {
    let tickers: Vec<TickerConfig> = config.tickers.iter().map(|t| t.to_config()).collect();
    if tickers.is_empty() {
        println!("No tickers configured. Run `fundflow setup` and add some.");
        return Ok(());
    }

    let store = Arc::new(SharesHistoryStore::open(
        &config.default_data_path()?.join("shares_history"),
    )?);

    // Step 0: scrape today's shares outstanding. A failed scrape is a
    // warning; the pipeline still runs on accumulated history.
    println!("Scraping iShares shares outstanding...");
    let scraper = ISharesProvider::new(config.ishares_base_url());
    scrape_shares(&scraper, &store, &tickers).await;

    // Step 1: fetch, compute and write each ticker.
    println!("Refreshing fund flows...");
    let price_provider =
        YahooPriceProvider::new(config.yahoo_base_url(), Arc::new(Cache::new()));
    let profile_provider =
        YahooProfileProvider::new(config.yahoo_base_url(), Arc::new(Cache::new()));
    let price_provider = &price_provider;
    let profile_provider = &profile_provider;

    let run_time = Utc::now();
    let pb = ui::new_progress_bar(tickers.len() as u64, true);
    pb.set_message("Processing tickers...");

    let report_futures = tickers.iter().map(|ticker| {
        let pb_clone = pb.clone();
        let store = Arc::clone(&store);
        async move {
            let result = process_ticker(
                ticker,
                price_provider,
                store.as_ref(),
                profile_provider,
                run_time,
                config.retention_days,
            )
            .await;
            pb_clone.inc(1);
            (ticker.symbol.clone(), result)
        }
    });

    let results = join_all(report_futures).await;
    pb.finish_and_clear();

    let output_dir = config.output_dir()?;
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output dir {}", output_dir.display()))?;

    let mut skipped = 0usize;
    for (symbol, result) in &results {
        match result {
            Ok(report) => {
                let path = output_dir.join(format!("{symbol}.json"));
                let json = serde_json::to_string_pretty(report)?;
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!(
                    "  Wrote {} ({} data points)",
                    path.display(),
                    report.flows.len()
                );
            }
            Err(reason) => {
                skipped += 1;
                warn!(%symbol, %reason, "Skipping ticker for this run");
                println!(
                    "  {}",
                    ui::style_text(&format!("Skipping {symbol}: {reason}"), ui::StyleType::Error)
                );
            }
        }
    }

    if skipped > 0 {
        bail!("{} of {} tickers skipped", skipped, results.len());
    }
    Ok(())
}

/// Scrapes the current shares-outstanding figure for every ticker that
/// carries iShares parameters and records it in the history store.
pub async fn scrape_shares(
    scraper: &ISharesProvider,
    store: &SharesHistoryStore,
    tickers: &[TickerConfig],
) {
    for ticker in tickers {
        if !ISharesProvider::is_configured(ticker) {
            debug!(symbol = %ticker.symbol, "No iShares config, skipping scrape");
            continue;
        }
        match scraper.fetch_snapshot(ticker, None).await {
            Ok(snapshot) => match store.record(&ticker.symbol, snapshot.date, snapshot.shares) {
                Ok(outcome) => {
                    info!(
                        symbol = %ticker.symbol,
                        date = %snapshot.date,
                        shares = snapshot.shares,
                        ?outcome,
                        "Scraped shares outstanding"
                    );
                }
                Err(e) => warn!(symbol = %ticker.symbol, error = %e, "Failed to record scrape"),
            },
            Err(e) => {
                warn!(
                    symbol = %ticker.symbol,
                    error = %e,
                    "iShares scrape failed, continuing with existing history"
                );
            }
        }
    }
    if let Err(e) = store.flush() {
        warn!(error = %e, "Failed to flush shares history store");
    }
}

/// The per-ticker pipeline: fetch both series and the profile, then hand off
/// to the pure computation. Fetch failures become skip reasons.
pub async fn process_ticker(
    ticker: &TickerConfig,
    price_provider: &(dyn PriceHistoryProvider + Send + Sync),
    shares_provider: &(dyn SharesHistoryProvider + Send + Sync),
    profile_provider: &(dyn FundProfileProvider + Send + Sync),
    run_time: DateTime<Utc>,
    retention_days: i64,
) -> Result<FundReport, SkipReason> {
    let symbol = &ticker.symbol;

    let shares = shares_provider.fetch_shares(symbol).await.map_err(|e| {
        debug!(%symbol, error = %e, "Shares history unavailable");
        SkipReason::NoSharesSeries
    })?;

    let closes = price_provider.fetch_closes(symbol).await.map_err(|e| {
        debug!(%symbol, error = %e, "Price history unavailable");
        SkipReason::NoPriceSeries
    })?;

    let profile = profile_provider
        .fetch_profile(symbol)
        .await
        .map_err(|e| SkipReason::ProfileUnavailable(e.to_string()))?;

    report::build_report(symbol, &shares, &closes, &profile, run_time, retention_days)
}
