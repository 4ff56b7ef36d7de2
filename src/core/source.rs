//! Data-source abstractions
//!
//! The pipeline depends on these seams, never on a concrete backend, so
//! tests substitute in-memory implementations and the batch runner wires in
//! HTTP providers and the local shares-history store.

use crate::core::metadata::FundProfile;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Raw daily close history for a symbol, in source order. May contain
/// duplicate or unordered dates; the pipeline dedups.
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    async fn fetch_closes(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>>;
}

/// Raw shares-outstanding history for a symbol, in source order.
#[async_trait]
pub trait SharesHistoryProvider: Send + Sync {
    async fn fetch_shares(&self, symbol: &str) -> Result<Vec<(NaiveDate, i64)>>;
}

/// Descriptive fund metadata. Implementations return partial profiles rather
/// than failing when individual fields are missing; an `Err` means the fetch
/// failed entirely.
#[async_trait]
pub trait FundProfileProvider: Send + Sync {
    async fn fetch_profile(&self, symbol: &str) -> Result<FundProfile>;
}
