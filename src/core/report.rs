//! Output-record assembly
//!
//! `build_report` is the whole per-ticker pipeline as a pure function from
//! (raw series, profile, run time) to an artifact or a skip reason. The batch
//! runner fans these out concurrently; nothing here touches I/O.

use crate::core::flow::{self, FlowPoint};
use crate::core::metadata::{
    self, FundMetadata, FundProfile, Holding, round2,
};
use crate::core::series;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Calendar days of flow history retained in the artifact. Older rows still
/// feed the rolling sums baked into the retained rows.
pub const RETENTION_DAYS: i64 = 730;

/// Why a ticker produced no artifact this run. The batch logs these and moves
/// on; any previous artifact stays on disk untouched.
#[derive(Debug, Error, PartialEq)]
pub enum SkipReason {
    #[error("no usable shares-outstanding series")]
    NoSharesSeries,
    #[error("no usable price series")]
    NoPriceSeries,
    #[error("shares and price series share no dates")]
    NoOverlap,
    #[error("negative shares outstanding ({shares}) on {date}")]
    NegativeShares { date: NaiveDate, shares: i64 },
    #[error("fund profile unavailable: {0}")]
    ProfileUnavailable(String),
}

/// Latest rolling values, rounded to whole currency units. All five horizons
/// are always present; an empty flow sequence yields zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub daily: f64,
    pub weekly: f64,
    pub monthly: f64,
    pub three_month: f64,
    pub six_month: f64,
}

impl FlowSummary {
    fn zero() -> Self {
        FlowSummary {
            daily: 0.0,
            weekly: 0.0,
            monthly: 0.0,
            three_month: 0.0,
            six_month: 0.0,
        }
    }

    fn from_latest(latest: &FlowPoint) -> Self {
        FlowSummary {
            daily: latest.daily.round(),
            weekly: latest.weekly.round(),
            monthly: latest.monthly.round(),
            three_month: latest.three_month.round(),
            six_month: latest.six_month.round(),
        }
    }
}

/// One retained flow row of the artifact. Flow values are whole currency
/// units, the close keeps two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    pub date: NaiveDate,
    pub close: f64,
    pub shares: i64,
    pub daily_flow: f64,
    pub weekly_flow: f64,
    pub monthly_flow: f64,
    pub three_month_flow: f64,
    pub six_month_flow: f64,
    pub cumulative_flow: f64,
}

impl From<&FlowPoint> for FlowRow {
    fn from(point: &FlowPoint) -> Self {
        FlowRow {
            date: point.date,
            close: round2(point.close),
            shares: point.shares,
            daily_flow: point.daily.round(),
            weekly_flow: point.weekly.round(),
            monthly_flow: point.monthly.round(),
            three_month_flow: point.three_month.round(),
            six_month_flow: point.six_month.round(),
            cumulative_flow: point.cumulative.round(),
        }
    }
}

/// The per-ticker output artifact. Rebuilt wholesale every run; field names
/// and units are a stable contract with the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundReport {
    pub ticker: String,
    pub name: String,
    pub last_updated: String,
    pub metadata: FundMetadata,
    pub summary: FlowSummary,
    pub holdings: Vec<Holding>,
    pub sectors: BTreeMap<String, f64>,
    pub flows: Vec<FlowRow>,
}

/// Runs alignment, flow computation and assembly for one ticker.
///
/// Raw series may be unordered and carry duplicate dates; the last observed
/// value per date wins. Missing descriptive fields become explicit `null`s in
/// the artifact, but a series that cannot be aligned skips the ticker.
pub fn build_report(
    ticker: &str,
    raw_shares: &[(NaiveDate, i64)],
    raw_closes: &[(NaiveDate, f64)],
    profile: &FundProfile,
    run_time: DateTime<Utc>,
    retention_days: i64,
) -> Result<FundReport, SkipReason> {
    let shares = series::dedup_last_wins(raw_shares);
    if shares.is_empty() {
        return Err(SkipReason::NoSharesSeries);
    }
    if let Some((date, count)) = shares.iter().find(|(_, count)| *count < 0) {
        return Err(SkipReason::NegativeShares {
            date: *date,
            shares: *count,
        });
    }

    let closes = series::dedup_last_wins(raw_closes);
    if closes.is_empty() {
        return Err(SkipReason::NoPriceSeries);
    }

    let aligned = series::align(&shares, &closes);
    if aligned.is_empty() {
        return Err(SkipReason::NoOverlap);
    }

    let flows = flow::compute_flows(&aligned);
    let summary = flows
        .last()
        .map(FlowSummary::from_latest)
        .unwrap_or_else(FlowSummary::zero);

    let cutoff = run_time.date_naive() - Duration::days(retention_days);
    let retained: Vec<FlowRow> = flows
        .iter()
        .filter(|point| point.date >= cutoff)
        .map(FlowRow::from)
        .collect();

    let latest_shares = aligned.last().map(|point| point.shares);

    Ok(FundReport {
        ticker: ticker.to_string(),
        name: profile.display_name(ticker),
        last_updated: run_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        metadata: FundMetadata {
            aum: profile.total_assets,
            nav: profile.nav_or_previous_close().map(round2),
            expense_ratio: profile.expense_ratio,
            shares_outstanding: latest_shares,
            currency: profile
                .currency
                .clone()
                .unwrap_or_else(|| "USD".to_string()),
        },
        summary,
        holdings: metadata::normalize_holdings(&profile.holdings),
        sectors: metadata::normalize_sectors(&profile.sector_weights),
        flows: retained,
    })
}
