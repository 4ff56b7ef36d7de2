use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// A tracked ETF. The iShares fields drive the shares-outstanding scraper;
/// without them only already-accumulated history is used for that symbol.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TickerConfig {
    pub symbol: String,
    pub ishares_product_id: Option<String>,
    pub ishares_name: Option<String>,
}

/// Config entries accept either a bare symbol string or the full form.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(untagged)]
pub enum TickerEntry {
    Symbol(String),
    Full(TickerConfig),
}

impl TickerEntry {
    pub fn to_config(&self) -> TickerConfig {
        match self {
            TickerEntry::Symbol(symbol) => TickerConfig {
                symbol: symbol.clone(),
                ishares_product_id: None,
                ishares_name: None,
            },
            TickerEntry::Full(config) => config.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ISharesProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub ishares: Option<ISharesProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            ishares: Some(ISharesProviderConfig {
                base_url: "https://www.ishares.com/us".to_string(),
            }),
        }
    }
}

fn default_retention_days() -> i64 {
    crate::core::report::RETENTION_DAYS
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub tickers: Vec<TickerEntry>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub output_dir: Option<String>,
    pub data_path: Option<String>,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fundflow", "fundflow")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "fundflow", "fundflow")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Directory the per-ticker JSON artifacts are written to.
    pub fn output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(PathBuf::from(dir));
        }
        Ok(self.default_data_path()?.join("data"))
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    pub fn ishares_base_url(&self) -> &str {
        self.providers
            .ishares
            .as_ref()
            .map_or("https://www.ishares.com/us", |p| &p.base_url)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
