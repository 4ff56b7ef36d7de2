use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::metadata::{FundProfile, RawHolding};
use crate::core::source::{FundProfileProvider, PriceHistoryProvider};
use crate::providers::util::with_retry;

const USER_AGENT: &str = "fundflow/1.0";

/// Yahoo wraps numeric fields as `{"raw": 1.23, "fmt": "1.23"}`.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
struct WrappedValue {
    raw: Option<f64>,
}

fn unwrap_raw(value: Option<WrappedValue>) -> Option<f64> {
    value.and_then(|v| v.raw)
}

// Daily close history via the chart endpoint.
pub struct YahooPriceProvider {
    base_url: String,
    cache: Arc<Cache<String, Vec<(NaiveDate, f64)>>>,
}

impl YahooPriceProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, Vec<(NaiveDate, f64)>>>) -> Self {
        YahooPriceProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[async_trait]
impl PriceHistoryProvider for YahooPriceProvider {
    #[instrument(
        name = "YahooCloseHistoryFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_closes(&self, symbol: &str) -> Result<Vec<(NaiveDate, f64)>> {
        if let Some(cached) = self.cache.get(&symbol.to_string()).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range=max",
            self.base_url, symbol
        );
        debug!("Requesting close history from {}", url);

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {} URL: {}", e, symbol, url))?;

        let data = response.json::<YahooChartResponse>().await?;
        let item = data
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

        let closes = extract_daily_closes(&item);
        debug!("Fetched {} close observations for {}", closes.len(), symbol);

        self.cache.put(symbol.to_string(), closes.clone()).await;

        Ok(closes)
    }
}

/// Pairs chart timestamps with closes, dropping null bars. Timestamps are
/// unix seconds; the calendar day is taken in UTC. Intraday duplicates of a
/// date survive here and are resolved by the pipeline's last-wins dedup.
fn extract_daily_closes(item: &ChartItem) -> Vec<(NaiveDate, f64)> {
    let (Some(timestamps), Some(closes)) = (
        item.timestamp.as_ref(),
        item.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return Vec::new();
    };

    timestamps
        .iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let close = (*close)?;
            let date = Utc.timestamp_opt(*ts, 0).single()?.date_naive();
            Some((date, close))
        })
        .collect()
}

// Descriptive metadata via the quoteSummary endpoint.
pub struct YahooProfileProvider {
    base_url: String,
    cache: Arc<Cache<String, FundProfile>>,
}

impl YahooProfileProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, FundProfile>>) -> Self {
        YahooProfileProvider {
            base_url: base_url.to_string(),
            cache,
        }
    }
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(alias = "quoteSummary")]
    quote_summary: QuoteSummaryResult,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryItem>>,
}

#[derive(Deserialize, Debug, Default)]
struct QuoteSummaryItem {
    price: Option<PriceModule>,
    #[serde(alias = "summaryDetail")]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(alias = "defaultKeyStatistics")]
    default_key_statistics: Option<KeyStatisticsModule>,
    #[serde(alias = "topHoldings")]
    top_holdings: Option<TopHoldingsModule>,
}

#[derive(Deserialize, Debug, Default)]
struct PriceModule {
    #[serde(alias = "longName")]
    long_name: Option<String>,
    #[serde(alias = "shortName")]
    short_name: Option<String>,
    currency: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct SummaryDetailModule {
    #[serde(alias = "previousClose")]
    previous_close: Option<WrappedValue>,
}

#[derive(Deserialize, Debug, Default)]
struct KeyStatisticsModule {
    #[serde(alias = "totalAssets")]
    total_assets: Option<WrappedValue>,
    #[serde(alias = "navPrice")]
    nav_price: Option<WrappedValue>,
    #[serde(alias = "annualReportExpenseRatio")]
    annual_report_expense_ratio: Option<WrappedValue>,
}

#[derive(Deserialize, Debug, Default)]
struct TopHoldingsModule {
    #[serde(default)]
    holdings: Vec<HoldingEntry>,
    #[serde(alias = "sectorWeightings", default)]
    sector_weightings: Vec<HashMap<String, WrappedValue>>,
}

#[derive(Deserialize, Debug)]
struct HoldingEntry {
    symbol: Option<String>,
    #[serde(alias = "holdingName")]
    holding_name: Option<String>,
    #[serde(alias = "holdingPercent")]
    holding_percent: Option<WrappedValue>,
}

impl From<QuoteSummaryItem> for FundProfile {
    fn from(item: QuoteSummaryItem) -> Self {
        let price = item.price.unwrap_or_default();
        let detail = item.summary_detail.unwrap_or_default();
        let stats = item.default_key_statistics.unwrap_or_default();
        let funds = item.top_holdings.unwrap_or_default();

        FundProfile {
            long_name: price.long_name,
            short_name: price.short_name,
            currency: price.currency,
            total_assets: unwrap_raw(stats.total_assets),
            nav: unwrap_raw(stats.nav_price),
            previous_close: unwrap_raw(detail.previous_close),
            expense_ratio: unwrap_raw(stats.annual_report_expense_ratio),
            holdings: funds
                .holdings
                .into_iter()
                .map(|h| RawHolding {
                    name: h.holding_name,
                    symbol: h.symbol,
                    weight: unwrap_raw(h.holding_percent),
                })
                .collect(),
            sector_weights: funds
                .sector_weightings
                .into_iter()
                .flat_map(|entry| {
                    entry
                        .into_iter()
                        .map(|(sector, weight)| (sector, weight.raw))
                })
                .collect(),
        }
    }
}

#[async_trait]
impl FundProfileProvider for YahooProfileProvider {
    #[instrument(
        name = "YahooProfileFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_profile(&self, symbol: &str) -> Result<FundProfile> {
        if let Some(cached) = self.cache.get(&symbol.to_string()).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=price,summaryDetail,defaultKeyStatistics,topHoldings",
            self.base_url, symbol
        );
        debug!("Requesting fund profile from {}", url);

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {} URL: {}", e, symbol, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} fetching profile for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: QuoteSummaryResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse profile response for {}: {}", symbol, e))?;

        let item = data
            .quote_summary
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No profile data found for symbol: {}", symbol))?;

        let profile = FundProfile::from(item);
        self.cache.put(symbol.to_string(), profile.clone()).await;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(url_path: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_close_history_fetch() {
        // Two bars a day apart; the middle null bar must be dropped.
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": { "currency": "USD" },
                    "timestamp": [1766995200, 1767081600, 1767168000],
                    "indicators": {
                        "quote": [{ "close": [59.5, null, 60.25] }]
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("/v8/finance/chart/EWY", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooPriceProvider::new(&mock_server.uri(), cache);
        let closes = provider.fetch_closes("EWY").await.unwrap();

        assert_eq!(closes.len(), 2);
        assert_eq!(closes[0].1, 59.5);
        assert_eq!(closes[1].1, 60.25);
        assert_eq!(closes[1].0 - closes[0].0, chrono::Duration::days(2));
    }

    #[tokio::test]
    async fn test_no_chart_data() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_mock_server("/v8/finance/chart/INVALID", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooPriceProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_closes("INVALID").await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_null_chart_result_is_an_error() {
        let mock_response = r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#;
        let mock_server = create_mock_server("/v8/finance/chart/GONE", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooPriceProvider::new(&mock_server.uri(), cache);
        assert!(provider.fetch_closes("GONE").await.is_err());
    }

    #[tokio::test]
    async fn test_successful_profile_fetch() {
        let mock_response = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {
                        "longName": "iShares MSCI South Korea ETF",
                        "shortName": "iShares MSCI South Korea",
                        "currency": "USD"
                    },
                    "summaryDetail": { "previousClose": { "raw": 61.2, "fmt": "61.20" } },
                    "defaultKeyStatistics": {
                        "totalAssets": { "raw": 7100000000.0, "fmt": "7.1B" },
                        "annualReportExpenseRatio": { "raw": 0.0059, "fmt": "0.59%" }
                    },
                    "topHoldings": {
                        "holdings": [
                            {
                                "symbol": "005930.KS",
                                "holdingName": "Samsung Electronics",
                                "holdingPercent": { "raw": 0.2251 }
                            },
                            { "symbol": "000660.KS" }
                        ],
                        "sectorWeightings": [
                            { "technology": { "raw": 0.5261 } },
                            { "financials": { "raw": 0.182 } }
                        ]
                    }
                }]
            }
        }"#;

        let mock_server =
            create_mock_server("/v10/finance/quoteSummary/EWY", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooProfileProvider::new(&mock_server.uri(), cache);
        let profile = provider.fetch_profile("EWY").await.unwrap();

        assert_eq!(
            profile.long_name.as_deref(),
            Some("iShares MSCI South Korea ETF")
        );
        assert_eq!(profile.currency.as_deref(), Some("USD"));
        assert_eq!(profile.total_assets, Some(7_100_000_000.0));
        assert_eq!(profile.nav, None);
        assert_eq!(profile.previous_close, Some(61.2));
        assert_eq!(profile.expense_ratio, Some(0.0059));
        assert_eq!(profile.holdings.len(), 2);
        assert_eq!(profile.holdings[0].weight, Some(0.2251));
        // Second holding is incomplete; normalization decides its fate later.
        assert_eq!(profile.holdings[1].name, None);
        assert_eq!(profile.sector_weights.len(), 2);
    }

    #[tokio::test]
    async fn test_profile_with_missing_modules_is_partial_not_error() {
        let mock_response = r#"{
            "quoteSummary": {
                "result": [{
                    "price": { "shortName": "Some Fund" }
                }]
            }
        }"#;

        let mock_server =
            create_mock_server("/v10/finance/quoteSummary/XYZ", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooProfileProvider::new(&mock_server.uri(), cache);
        let profile = provider.fetch_profile("XYZ").await.unwrap();

        assert_eq!(profile.short_name.as_deref(), Some("Some Fund"));
        assert_eq!(profile.total_assets, None);
        assert_eq!(profile.expense_ratio, None);
        assert!(profile.holdings.is_empty());
        assert!(profile.sector_weights.is_empty());
    }

    #[tokio::test]
    async fn test_profile_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/EWY"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let cache = Arc::new(Cache::new());
        let provider = YahooProfileProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_profile("EWY").await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .starts_with("HTTP error: 500")
        );
    }

    #[tokio::test]
    async fn test_profile_malformed_response() {
        let mock_response = r#"{"quoteSummary": "nope"}"#;
        let mock_server =
            create_mock_server("/v10/finance/quoteSummary/EWY", mock_response).await;
        let cache = Arc::new(Cache::new());

        let provider = YahooProfileProvider::new(&mock_server.uri(), cache);
        let result = provider.fetch_profile("EWY").await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse profile response for EWY")
        );
    }
}
