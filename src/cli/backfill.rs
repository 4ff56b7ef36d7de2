//! Historical shares-outstanding backfill
//!
//! Walks business days in a range and asks the iShares endpoint for each one
//! via `asOfDate`. The endpoint silently answers with the nearest date it
//! has; only exact matches are stored, so gaps stay gaps instead of being
//! interpolated.

use crate::core::config::{AppConfig, TickerConfig};
use crate::providers::ishares::ISharesProvider;
use crate::store::SharesHistoryStore;
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Business-day dates (Mon-Fri) between `start` and `end`, inclusive.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(current);
        }
        current = current + Days::new(1);
    }
    dates
}

pub async fn run(config: &AppConfig, start: NaiveDate, end: NaiveDate, delay_ms: u64) -> Result<()> {
    let tickers: Vec<TickerConfig> = config.tickers.iter().map(|t| t.to_config()).collect();
    let store = SharesHistoryStore::open(&config.default_data_path()?.join("shares_history"))?;
    let scraper = ISharesProvider::new(config.ishares_base_url());

    println!("Backfilling shares outstanding from {start} to {end}...");
    let dates = business_days(start, end);

    let mut total_added = 0usize;
    for ticker in &tickers {
        if !ISharesProvider::is_configured(ticker) {
            debug!(symbol = %ticker.symbol, "No iShares config, skipping backfill");
            continue;
        }

        let mut added = 0usize;
        let mut mismatched = 0usize;
        for date in &dates {
            if store.contains(&ticker.symbol, *date)? {
                continue;
            }

            match scraper.fetch_snapshot(ticker, Some(*date)).await {
                Ok(snapshot) if snapshot.date == *date => {
                    store.record(&ticker.symbol, snapshot.date, snapshot.shares)?;
                    added += 1;
                }
                Ok(snapshot) => {
                    // Answer for a different date, usually a holiday.
                    debug!(
                        symbol = %ticker.symbol,
                        requested = %date,
                        returned = %snapshot.date,
                        "Skipping as-of date mismatch"
                    );
                    mismatched += 1;
                }
                Err(e) => {
                    warn!(symbol = %ticker.symbol, %date, error = %e, "Backfill request failed");
                }
            }
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        info!(
            symbol = %ticker.symbol,
            added,
            mismatched,
            "Backfill finished for ticker"
        );
        println!(
            "  {}: +{} new entries ({} date mismatches)",
            ticker.symbol, added, mismatched
        );
        total_added += added;
    }

    store.flush()?;
    println!("Backfill complete: {total_added} new entries.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_business_days_skip_weekends() {
        // 2026-02-20 is a Friday.
        let days = business_days(d("2026-02-20"), d("2026-02-24"));
        assert_eq!(days, vec![d("2026-02-20"), d("2026-02-23"), d("2026-02-24")]);
    }

    #[test]
    fn test_business_days_empty_range() {
        assert!(business_days(d("2026-02-21"), d("2026-02-22")).is_empty());
        assert!(business_days(d("2026-02-24"), d("2026-02-20")).is_empty());
    }
}
