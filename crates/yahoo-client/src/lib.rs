use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use screener_core::{Fundamentals, MarketDataProvider, PriceBar, ProviderError, StockSnapshot};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
pub const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const SUMMARY_MODULES: &str = "price,summaryDetail,assetProfile,defaultKeyStatistics,financialData";
const HISTORY_RANGE: &str = "5y";
const HISTORY_INTERVAL: &str = "1d";
/// How long a refused crumb is remembered before asking again.
const CRUMB_RETRY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct YahooConfig {
    pub base_url: String,
    /// Page visited once to obtain the session cookie the crumb is bound to.
    pub cookie_url: String,
    pub use_crumb: bool,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cookie_url: DEFAULT_COOKIE_URL.to_string(),
            use_crumb: true,
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug)]
enum CrumbState {
    Unknown,
    Ready(String),
    Failed(Instant),
}

#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    use_crumb: bool,
    crumb: Arc<Mutex<CrumbState>>,
}

impl YahooClient {
    pub fn new(config: YahooConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_url: config.cookie_url,
            use_crumb: config.use_crumb,
            crumb: Arc::new(Mutex::new(CrumbState::Unknown)),
        }
    }

    async fn send_request(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        builder
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    /// `base_url` plus one percent-encoded path segment per entry.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Transport(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Transport(format!("Base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Cached crumb for the current cookie session, fetched on first use.
    ///
    /// Concurrent callers wait for a single fetch. A refused crumb is
    /// remembered for `CRUMB_RETRY_AFTER`, during which lookups go out
    /// without one.
    async fn crumb(&self) -> Option<String> {
        if !self.use_crumb {
            return None;
        }

        let mut state = self.crumb.lock().await;
        match &*state {
            CrumbState::Ready(crumb) => return Some(crumb.clone()),
            CrumbState::Failed(at) if at.elapsed() < CRUMB_RETRY_AFTER => return None,
            _ => {}
        }

        match self.fetch_crumb().await {
            Ok(crumb) => {
                tracing::debug!("Obtained Yahoo crumb");
                *state = CrumbState::Ready(crumb.clone());
                Some(crumb)
            }
            Err(e) => {
                tracing::warn!("Yahoo crumb unavailable, continuing without it: {}", e);
                *state = CrumbState::Failed(Instant::now());
                None
            }
        }
    }

    async fn fetch_crumb(&self) -> Result<String, ProviderError> {
        // The cookie page usually answers 404; only the Set-Cookie header matters.
        if let Err(e) = self.send_request(self.client.get(&self.cookie_url)).await {
            tracing::debug!("Yahoo cookie request failed: {}", e);
        }

        let url = self.endpoint(&["v1", "test", "getcrumb"])?;
        let response = self.send_request(self.client.get(url)).await?;
        if !response.status().is_success() {
            return Err(ProviderError::Api(format!("Crumb HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let crumb = body.trim();
        if crumb.is_empty() || crumb.contains('<') {
            return Err(ProviderError::InvalidData("Unexpected crumb body".to_string()));
        }
        Ok(crumb.to_string())
    }

    async fn invalidate_crumb(&self) {
        *self.crumb.lock().await = CrumbState::Unknown;
    }

    /// Get the quoteSummary modules for a ticker
    pub async fn get_quote_summary(&self, ticker: &str) -> Result<QuoteSummary, ProviderError> {
        let url = self.endpoint(&["v10", "finance", "quoteSummary", ticker])?;

        let mut query = vec![("modules", SUMMARY_MODULES.to_string())];
        if let Some(crumb) = self.crumb().await {
            query.push(("crumb", crumb));
        }

        let response = self.send_request(self.client.get(url).query(&query)).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }
        if status == StatusCode::UNAUTHORIZED {
            self.invalidate_crumb().await;
        }
        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "quoteSummary HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let body: QuoteSummaryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidData(e.to_string()))?;

        body.quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| ProviderError::NotFound(ticker.to_string()))
    }

    /// Get daily bars covering the last five years
    pub async fn get_chart(&self, ticker: &str) -> Result<Vec<PriceBar>, ProviderError> {
        let url = self.endpoint(&["v8", "finance", "chart", ticker])?;

        let response = self
            .send_request(self.client.get(url).query(&[
                ("range", HISTORY_RANGE),
                ("interval", HISTORY_INTERVAL),
                ("includePrePost", "false"),
            ]))
            .await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Api(format!(
                "Chart HTTP {}: {}",
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidData(e.to_string()))?;

        body.chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(ChartResult::into_bars)
            .ok_or_else(|| ProviderError::NotFound(ticker.to_string()))
    }
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new(YahooConfig::default())
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn snapshot(&self, ticker: &str) -> Result<StockSnapshot, ProviderError> {
        Ok(self.get_quote_summary(ticker).await?.snapshot(ticker))
    }

    async fn history(&self, ticker: &str) -> Result<Vec<PriceBar>, ProviderError> {
        self.get_chart(ticker).await
    }

    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, ProviderError> {
        Ok(self.get_quote_summary(ticker).await?.fundamentals())
    }
}

type Module = HashMap<String, serde_json::Value>;

/// The quoteSummary modules this client requests. Any of them may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    #[serde(default)]
    price: Option<Module>,
    #[serde(default)]
    summary_detail: Option<Module>,
    #[serde(default)]
    asset_profile: Option<Module>,
    #[serde(default)]
    default_key_statistics: Option<Module>,
    #[serde(default)]
    financial_data: Option<Module>,
}

/// Numeric field; Yahoo wraps most of them as `{"raw": .., "fmt": ..}`.
fn number(module: &Option<Module>, key: &str) -> Option<f64> {
    let value = module.as_ref()?.get(key)?;
    match value {
        serde_json::Value::Object(map) => map.get("raw")?.as_f64(),
        other => other.as_f64(),
    }
}

fn text(module: &Option<Module>, key: &str) -> Option<String> {
    module
        .as_ref()?
        .get(key)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl QuoteSummary {
    pub fn snapshot(&self, ticker: &str) -> StockSnapshot {
        StockSnapshot {
            ticker: ticker.to_string(),
            short_name: text(&self.price, "shortName"),
            current_price: number(&self.financial_data, "currentPrice")
                .or_else(|| number(&self.price, "regularMarketPrice")),
            previous_close: number(&self.summary_detail, "previousClose"),
            open: number(&self.summary_detail, "open"),
            day_high: number(&self.summary_detail, "dayHigh"),
            day_low: number(&self.summary_detail, "dayLow"),
            volume: number(&self.summary_detail, "volume"),
            market_cap: self.market_cap(),
            trailing_pe: number(&self.summary_detail, "trailingPE"),
            forward_pe: self.forward_pe(),
            dividend_yield: number(&self.summary_detail, "dividendYield"),
            sector: text(&self.asset_profile, "sector"),
            industry: text(&self.asset_profile, "industry"),
        }
    }

    pub fn fundamentals(&self) -> Fundamentals {
        Fundamentals {
            short_name: text(&self.price, "shortName"),
            peg_ratio: number(&self.default_key_statistics, "pegRatio"),
            forward_pe: self.forward_pe(),
            trailing_pe: number(&self.summary_detail, "trailingPE"),
            price_to_sales: number(&self.summary_detail, "priceToSalesTrailing12Months"),
            price_to_book: number(&self.default_key_statistics, "priceToBook"),
            earnings_quarterly_growth: number(&self.default_key_statistics, "earningsQuarterlyGrowth"),
            free_cash_flow: number(&self.financial_data, "freeCashflow"),
            market_cap: self.market_cap(),
            dividend_yield: number(&self.summary_detail, "dividendYield"),
            return_on_equity: number(&self.financial_data, "returnOnEquity"),
        }
    }

    fn market_cap(&self) -> Option<f64> {
        number(&self.summary_detail, "marketCap").or_else(|| number(&self.price, "marketCap"))
    }

    fn forward_pe(&self) -> Option<f64> {
        number(&self.summary_detail, "forwardPE")
            .or_else(|| number(&self.default_key_statistics, "forwardPE"))
    }
}

// Response structures
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    #[serde(default)]
    result: Option<Vec<QuoteSummary>>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Rows with any missing OHLC value are dropped; a missing volume counts as zero.
    fn into_bars(self) -> Vec<PriceBar> {
        let offset = self.meta.gmtoffset.unwrap_or(0);
        let quote = match self.indicators.quote.into_iter().next() {
            Some(q) => q,
            None => return Vec::new(),
        };
        let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

        self.timestamp
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                Some(PriceBar {
                    date: DateTime::from_timestamp(ts + offset, 0)?.date_naive(),
                    open: at(&quote.open, i)?,
                    high: at(&quote.high, i)?,
                    low: at(&quote.low, i)?,
                    close: at(&quote.close, i)?,
                    volume: at(&quote.volume, i).unwrap_or(0.0),
                })
            })
            .collect()
    }
}
