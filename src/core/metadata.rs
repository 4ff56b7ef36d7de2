//! Fund metadata types and normalization
//!
//! Raw profiles arrive with every field optional; normalization keeps the
//! absent-vs-zero distinction intact so the presentation layer can tell "no
//! data" from an actual zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Maximum holdings emitted per fund, ranked by weight.
pub const TOP_HOLDINGS: usize = 10;

/// Descriptive fund attributes as delivered by the data source. Holdings and
/// sector weights are raw 0-1 fractions at this stage.
#[derive(Debug, Clone, Default)]
pub struct FundProfile {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub currency: Option<String>,
    pub total_assets: Option<f64>,
    pub nav: Option<f64>,
    pub previous_close: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub holdings: Vec<RawHolding>,
    pub sector_weights: Vec<(String, Option<f64>)>,
}

impl FundProfile {
    /// Display name fallback chain: long name, short name, then the ticker.
    pub fn display_name(&self, ticker: &str) -> String {
        self.long_name
            .clone()
            .or_else(|| self.short_name.clone())
            .unwrap_or_else(|| ticker.to_string())
    }

    /// NAV with the previous close as fallback; `None` when the source has
    /// neither.
    pub fn nav_or_previous_close(&self) -> Option<f64> {
        self.nav.or(self.previous_close)
    }
}

/// A single top-holding entry before validation. Any missing field makes the
/// entry malformed.
#[derive(Debug, Clone, Default)]
pub struct RawHolding {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub weight: Option<f64>,
}

/// Rounds to two decimal places, the artifact precision for percentages.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A validated holding with its weight as a 0-100 percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub name: String,
    pub symbol: String,
    pub weight: f64,
}

/// Validates and ranks holdings: malformed entries are dropped with a debug
/// log, the rest are sorted by weight and capped at [`TOP_HOLDINGS`], with
/// fraction weights scaled to percentages.
pub fn normalize_holdings(raw: &[RawHolding]) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = raw
        .iter()
        .filter_map(|h| match (&h.name, &h.symbol, h.weight) {
            (Some(name), Some(symbol), Some(weight)) if weight.is_finite() => Some(Holding {
                name: name.clone(),
                symbol: symbol.clone(),
                weight: round2(weight * 100.0),
            }),
            _ => {
                debug!(holding = ?h, "Dropping malformed holding entry");
                None
            }
        })
        .collect();

    holdings.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    holdings.truncate(TOP_HOLDINGS);
    holdings
}

/// Scales 0-1 sector fractions to 0-100 percentages. Entries without a weight
/// are dropped; the map is ordered so serialization is deterministic.
pub fn normalize_sectors(raw: &[(String, Option<f64>)]) -> BTreeMap<String, f64> {
    raw.iter()
        .filter_map(|(sector, weight)| match weight {
            Some(w) if w.is_finite() => Some((sector.clone(), round2(w * 100.0))),
            _ => {
                debug!(%sector, "Dropping sector entry without a usable weight");
                None
            }
        })
        .collect()
}

/// The `metadata` block of the output artifact. Optional fields serialize as
/// `null`, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundMetadata {
    pub aum: Option<f64>,
    pub nav: Option<f64>,
    pub expense_ratio: Option<f64>,
    pub shares_outstanding: Option<i64>,
    pub currency: String,
}
