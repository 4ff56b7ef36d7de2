//! iShares shares-outstanding scraper
//!
//! The fund-page CSV endpoint leads with metadata lines such as
//! `Shares Outstanding,"116,000,000.00"` and
//! `Fund Holdings as of,"Feb 25, 2026"`. Only those two lines are parsed;
//! the holdings table below them is ignored. Historical figures are
//! available through the `asOfDate` query parameter.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use tracing::debug;

use crate::core::config::TickerConfig;
use crate::providers::util::with_retry;

// The endpoint rejects non-browser user agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Number of leading CSV lines scanned for metadata.
const METADATA_LINES: usize = 10;

/// One scraped observation: the fund's as-of date and share count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharesSnapshot {
    pub date: NaiveDate,
    pub shares: i64,
}

pub struct ISharesProvider {
    base_url: String,
}

impl ISharesProvider {
    pub fn new(base_url: &str) -> Self {
        ISharesProvider {
            base_url: base_url.to_string(),
        }
    }

    /// Whether a ticker carries the product id and URL slug the endpoint
    /// needs. Tickers without them are simply not scraped.
    pub fn is_configured(ticker: &TickerConfig) -> bool {
        ticker.ishares_product_id.is_some() && ticker.ishares_name.is_some()
    }

    fn fund_csv_url(&self, ticker: &TickerConfig, as_of: Option<NaiveDate>) -> Result<String> {
        let product_id = ticker
            .ishares_product_id
            .as_ref()
            .ok_or_else(|| anyhow!("No iShares product id for {}", ticker.symbol))?;
        let name = ticker
            .ishares_name
            .as_ref()
            .ok_or_else(|| anyhow!("No iShares name for {}", ticker.symbol))?;

        let mut url = format!(
            "{}/products/{}/{}/1467271812596.ajax?fileType=csv&fileName={}_holdings&dataType=fund",
            self.base_url, product_id, name, ticker.symbol
        );
        if let Some(date) = as_of {
            url.push_str(&format!("&asOfDate={}", date.format("%Y%m%d")));
        }
        Ok(url)
    }

    /// Fetches the fund CSV and parses the as-of date and shares outstanding.
    /// `as_of` requests a specific business day; the endpoint may answer with
    /// a different date (callers decide whether that matters).
    pub async fn fetch_snapshot(
        &self,
        ticker: &TickerConfig,
        as_of: Option<NaiveDate>,
    ) -> Result<SharesSnapshot> {
        let url = self.fund_csv_url(ticker, as_of)?;
        debug!("Requesting iShares fund CSV from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("iShares request failed for {}", ticker.symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} from iShares for {}",
                response.status(),
                ticker.symbol
            ));
        }

        let text = response.text().await?;
        let date = parse_holdings_date(&text)
            .ok_or_else(|| anyhow!("Could not parse as-of date for {}", ticker.symbol))?;
        let shares = parse_shares_outstanding(&text)
            .ok_or_else(|| anyhow!("Could not parse shares outstanding for {}", ticker.symbol))?;

        Ok(SharesSnapshot { date, shares })
    }
}

/// Extracts the share count from the CSV metadata lines. The value keeps its
/// thousands separators inside one quoted CSV field, so everything after the
/// first comma is cleaned as a whole.
pub fn parse_shares_outstanding(text: &str) -> Option<i64> {
    for line in text.lines().take(METADATA_LINES) {
        let line = line.trim().trim_start_matches('\u{feff}');
        if !line.to_lowercase().starts_with("shares outstanding") {
            continue;
        }
        let (_, rest) = line.split_once(',')?;
        let cleaned: String = rest
            .chars()
            .filter(|c| *c != '"' && *c != ',')
            .collect::<String>()
            .trim()
            .to_string();
        if let Ok(value) = cleaned.parse::<f64>() {
            return Some(value as i64);
        }
    }
    None
}

/// Extracts the `Fund Holdings as of` date, e.g. `"Feb 25, 2026"`.
pub fn parse_holdings_date(text: &str) -> Option<NaiveDate> {
    for line in text.lines().take(METADATA_LINES) {
        let line = line.trim().trim_start_matches('\u{feff}');
        if !line.to_lowercase().starts_with("fund holdings as of") {
            continue;
        }
        let (_, rest) = line.split_once(',')?;
        let cleaned: String = rest.chars().filter(|c| *c != '"').collect();
        let cleaned = cleaned.trim().trim_end_matches(',').trim();
        if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%b %d, %Y") {
            return Some(date);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FUND_CSV: &str = "\u{feff}iShares MSCI South Korea ETF\n\
Fund Holdings as of,\"Feb 25, 2026\"\n\
Inception Date,\"May 09, 2000\"\n\
Shares Outstanding,\"116,000,000.00\"\n\
\n\
Ticker,Name,Sector,Asset Class\n\
005930,SAMSUNG ELECTRONICS LTD,Information Technology,Equity\n";

    fn ticker() -> TickerConfig {
        TickerConfig {
            symbol: "EWY".to_string(),
            ishares_product_id: Some("239681".to_string()),
            ishares_name: Some("ishares-msci-south-korea-etf".to_string()),
        }
    }

    #[test]
    fn test_parse_shares_outstanding_with_thousands_separators() {
        assert_eq!(parse_shares_outstanding(FUND_CSV), Some(116_000_000));
    }

    #[test]
    fn test_parse_holdings_date() {
        assert_eq!(
            parse_holdings_date(FUND_CSV),
            Some(NaiveDate::from_ymd_opt(2026, 2, 25).unwrap())
        );
    }

    #[test]
    fn test_parse_tolerates_case_and_missing_lines() {
        let text = "shares outstanding,42\n";
        assert_eq!(parse_shares_outstanding(text), Some(42));
        assert_eq!(parse_holdings_date(text), None);
        assert_eq!(parse_shares_outstanding("no metadata here\n"), None);
    }

    #[test]
    fn test_metadata_must_be_in_leading_lines() {
        let mut text = "header\n".repeat(12);
        text.push_str("Shares Outstanding,\"1,000\"\n");
        assert_eq!(parse_shares_outstanding(&text), None);
    }

    #[test]
    fn test_is_configured() {
        assert!(ISharesProvider::is_configured(&ticker()));
        let bare = TickerConfig {
            symbol: "SPY".to_string(),
            ishares_product_id: None,
            ishares_name: None,
        };
        assert!(!ISharesProvider::is_configured(&bare));
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/products/239681/ishares-msci-south-korea-etf/1467271812596.ajax",
            ))
            .and(query_param("fileType", "csv"))
            .and(query_param("dataType", "fund"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FUND_CSV))
            .mount(&mock_server)
            .await;

        let provider = ISharesProvider::new(&mock_server.uri());
        let snapshot = provider.fetch_snapshot(&ticker(), None).await.unwrap();

        assert_eq!(snapshot.shares, 116_000_000);
        assert_eq!(
            snapshot.date,
            NaiveDate::from_ymd_opt(2026, 2, 25).unwrap()
        );
    }

    #[tokio::test]
    async fn test_fetch_snapshot_with_as_of_date() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/products/239681/ishares-msci-south-korea-etf/1467271812596.ajax",
            ))
            .and(query_param("asOfDate", "20260220"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(
                    "Fund Holdings as of,\"Feb 20, 2026\"\nShares Outstanding,\"99,000,000.00\"\n",
                ),
            )
            .mount(&mock_server)
            .await;

        let provider = ISharesProvider::new(&mock_server.uri());
        let as_of = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let snapshot = provider
            .fetch_snapshot(&ticker(), Some(as_of))
            .await
            .unwrap();

        assert_eq!(snapshot.date, as_of);
        assert_eq!(snapshot.shares, 99_000_000);
    }

    #[tokio::test]
    async fn test_fetch_snapshot_unparsable_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/products/239681/ishares-msci-south-korea-etf/1467271812596.ajax",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>captcha</html>"))
            .mount(&mock_server)
            .await;

        let provider = ISharesProvider::new(&mock_server.uri());
        let result = provider.fetch_snapshot(&ticker(), None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_snapshot_requires_ishares_config() {
        let provider = ISharesProvider::new("http://unused.invalid");
        let bare = TickerConfig {
            symbol: "SPY".to_string(),
            ishares_product_id: None,
            ishares_name: None,
        };
        assert!(provider.fetch_snapshot(&bare, None).await.is_err());
    }
}
