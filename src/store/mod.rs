//! Persistent shares-outstanding history
//!
//! The upstream market API rarely carries usable shares-outstanding history,
//! so the scraper accumulates one observation per (symbol, as-of date) across
//! runs. Keys are `SYMBOL/YYYY-MM-DD`, which keeps per-symbol prefix scans in
//! chronological order.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tracing::debug;

use crate::core::source::SharesHistoryProvider;

const PARTITION: &str = "shares_history";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// What [`SharesHistoryStore::record`] did with an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    New,
    Updated { previous: i64 },
    Unchanged,
}

pub struct SharesHistoryStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl SharesHistoryStore {
    pub fn open(path: &Path) -> Result<Self> {
        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open shares history at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open shares history partition")?;
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn key(symbol: &str, date: NaiveDate) -> String {
        format!("{symbol}/{}", date.format(DATE_FORMAT))
    }

    /// Stores one observation. Re-recording a (symbol, date) pair overwrites,
    /// so the last scraped value for a date wins.
    pub fn record(&self, symbol: &str, date: NaiveDate, shares: i64) -> Result<RecordOutcome> {
        let key = Self::key(symbol, date);
        let previous = self
            .partition
            .get(&key)?
            .map(|raw| parse_shares(&raw))
            .transpose()?;

        let outcome = match previous {
            Some(existing) if existing == shares => return Ok(RecordOutcome::Unchanged),
            Some(existing) => RecordOutcome::Updated { previous: existing },
            None => RecordOutcome::New,
        };

        self.partition.insert(&key, shares.to_string())?;
        debug!(%symbol, %date, shares, ?outcome, "Recorded shares observation");
        Ok(outcome)
    }

    /// Whether an observation exists for the exact (symbol, date) pair.
    pub fn contains(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        Ok(self.partition.contains_key(Self::key(symbol, date))?)
    }

    /// All observations for a symbol, ascending by date.
    pub fn history(&self, symbol: &str) -> Result<Vec<(NaiveDate, i64)>> {
        let prefix = format!("{symbol}/");
        let mut points = Vec::new();
        for entry in self.partition.prefix(&prefix) {
            let (key, value) = entry?;
            let key = std::str::from_utf8(&key).context("Non-UTF8 store key")?;
            let date_str = key
                .strip_prefix(&prefix)
                .ok_or_else(|| anyhow!("Unexpected key {key} under prefix {prefix}"))?;
            let date = NaiveDate::parse_from_str(date_str, DATE_FORMAT)
                .with_context(|| format!("Malformed date in store key {key}"))?;
            points.push((date, parse_shares(&value)?));
        }
        Ok(points)
    }

    /// Forces buffered writes to disk. Called once after a scrape/backfill
    /// batch rather than per observation.
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

fn parse_shares(raw: &[u8]) -> Result<i64> {
    let text = std::str::from_utf8(raw).context("Non-UTF8 shares value")?;
    text.parse::<i64>()
        .with_context(|| format!("Malformed shares value '{text}'"))
}

#[async_trait]
impl SharesHistoryProvider for SharesHistoryStore {
    async fn fetch_shares(&self, symbol: &str) -> Result<Vec<(NaiveDate, i64)>> {
        self.history(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_record_and_history_round_trip() {
        let dir = tempdir().unwrap();
        let store = SharesHistoryStore::open(dir.path()).unwrap();

        // Out-of-order inserts come back sorted by date.
        store.record("EWY", d("2026-02-25"), 116_000_000).unwrap();
        store.record("EWY", d("2026-02-23"), 115_500_000).unwrap();

        let history = store.history("EWY").unwrap();
        assert_eq!(
            history,
            vec![
                (d("2026-02-23"), 115_500_000),
                (d("2026-02-25"), 116_000_000)
            ]
        );
    }

    #[test]
    fn test_record_outcomes() {
        let dir = tempdir().unwrap();
        let store = SharesHistoryStore::open(dir.path()).unwrap();

        assert_eq!(
            store.record("EWY", d("2026-02-25"), 100).unwrap(),
            RecordOutcome::New
        );
        assert_eq!(
            store.record("EWY", d("2026-02-25"), 100).unwrap(),
            RecordOutcome::Unchanged
        );
        assert_eq!(
            store.record("EWY", d("2026-02-25"), 105).unwrap(),
            RecordOutcome::Updated { previous: 100 }
        );
        assert_eq!(store.history("EWY").unwrap(), vec![(d("2026-02-25"), 105)]);
    }

    #[test]
    fn test_symbols_are_isolated() {
        let dir = tempdir().unwrap();
        let store = SharesHistoryStore::open(dir.path()).unwrap();

        store.record("EWY", d("2026-02-25"), 100).unwrap();
        store.record("EWJ", d("2026-02-25"), 200).unwrap();

        assert_eq!(store.history("EWY").unwrap().len(), 1);
        assert_eq!(store.history("EWJ").unwrap().len(), 1);
        assert!(store.history("SPY").unwrap().is_empty());
        assert!(store.contains("EWY", d("2026-02-25")).unwrap());
        assert!(!store.contains("EWY", d("2026-02-24")).unwrap());
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = SharesHistoryStore::open(dir.path()).unwrap();
            store.record("EWY", d("2026-02-25"), 100).unwrap();
            store.flush().unwrap();
        }
        let store = SharesHistoryStore::open(dir.path()).unwrap();
        assert_eq!(store.history("EWY").unwrap(), vec![(d("2026-02-25"), 100)]);
    }
}
