use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{UniverseError, WeightError};

/// Whether a lower or a higher raw value makes a stock more attractive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Lower is better; contributes `weight / value`.
    Inverse,
    /// Higher is better; contributes `weight * value`.
    Direct,
}

/// The fixed set of metrics the value screener scores on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Peg,
    ForwardPe,
    TrailingPe,
    PriceToSales,
    PriceToBook,
    EarningsGrowth,
    FcfYield,
    DividendYield,
    ReturnOnEquity,
}

impl Metric {
    pub const COUNT: usize = 9;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::Peg,
        Metric::ForwardPe,
        Metric::TrailingPe,
        Metric::PriceToSales,
        Metric::PriceToBook,
        Metric::EarningsGrowth,
        Metric::FcfYield,
        Metric::DividendYield,
        Metric::ReturnOnEquity,
    ];

    /// Wire name used in JSON results and in `<key>_weight` query parameters.
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Peg => "peg",
            Metric::ForwardPe => "forward_pe",
            Metric::TrailingPe => "pe_ttm",
            Metric::PriceToSales => "ps",
            Metric::PriceToBook => "pb",
            Metric::EarningsGrowth => "projected_growth",
            Metric::FcfYield => "fcf_yield",
            Metric::DividendYield => "dividend_yield",
            Metric::ReturnOnEquity => "roe",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Peg
            | Metric::ForwardPe
            | Metric::TrailingPe
            | Metric::PriceToSales
            | Metric::PriceToBook => MetricKind::Inverse,
            Metric::EarningsGrowth
            | Metric::FcfYield
            | Metric::DividendYield
            | Metric::ReturnOnEquity => MetricKind::Direct,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raw per-ticker record returned by a market data provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub short_name: Option<String>,
    pub peg_ratio: Option<f64>,
    pub forward_pe: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub price_to_sales: Option<f64>,
    pub price_to_book: Option<f64>,
    pub earnings_quarterly_growth: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub market_cap: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub return_on_equity: Option<f64>,
}

impl Fundamentals {
    /// Free cash flow divided by market cap, when both are known and the cap is positive.
    pub fn fcf_yield(&self) -> Option<f64> {
        match (self.free_cash_flow, self.market_cap) {
            (Some(fcf), Some(cap)) if cap > 0.0 => Some(fcf / cap),
            _ => None,
        }
    }
}

/// One optional value per [`Metric`]. `None` means the provider had no data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MetricSet {
    pub peg: Option<f64>,
    pub forward_pe: Option<f64>,
    pub pe_ttm: Option<f64>,
    pub ps: Option<f64>,
    pub pb: Option<f64>,
    pub projected_growth: Option<f64>,
    pub fcf_yield: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub roe: Option<f64>,
}

impl MetricSet {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Peg => self.peg,
            Metric::ForwardPe => self.forward_pe,
            Metric::TrailingPe => self.pe_ttm,
            Metric::PriceToSales => self.ps,
            Metric::PriceToBook => self.pb,
            Metric::EarningsGrowth => self.projected_growth,
            Metric::FcfYield => self.fcf_yield,
            Metric::DividendYield => self.dividend_yield,
            Metric::ReturnOnEquity => self.roe,
        }
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        let slot = match metric {
            Metric::Peg => &mut self.peg,
            Metric::ForwardPe => &mut self.forward_pe,
            Metric::TrailingPe => &mut self.pe_ttm,
            Metric::PriceToSales => &mut self.ps,
            Metric::PriceToBook => &mut self.pb,
            Metric::EarningsGrowth => &mut self.projected_growth,
            Metric::FcfYield => &mut self.fcf_yield,
            Metric::DividendYield => &mut self.dividend_yield,
            Metric::ReturnOnEquity => &mut self.roe,
        };
        *slot = Some(value);
        self
    }
}

impl From<&Fundamentals> for MetricSet {
    fn from(f: &Fundamentals) -> Self {
        Self {
            peg: f.peg_ratio,
            forward_pe: f.forward_pe,
            pe_ttm: f.trailing_pe,
            ps: f.price_to_sales,
            pb: f.price_to_book,
            projected_growth: f.earnings_quarterly_growth,
            fcf_yield: f.fcf_yield(),
            dividend_yield: f.dividend_yield,
            roe: f.return_on_equity,
        }
    }
}

/// Largest accepted weight. Keeps weighted sums finite for any realistic metric value.
pub const MAX_WEIGHT: f64 = 1_000_000.0;

/// Per-metric weights for one screening request. Every weight defaults to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    weights: [f64; Metric::COUNT],
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            weights: [1.0; Metric::COUNT],
        }
    }
}

impl WeightConfig {
    pub fn get(&self, metric: Metric) -> f64 {
        self.weights[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, weight: f64) -> Result<(), WeightError> {
        if !(0.0..=MAX_WEIGHT).contains(&weight) {
            return Err(WeightError {
                metric: metric.key(),
                value: weight,
            });
        }
        self.weights[metric.index()] = weight;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScoredTicker {
    pub ticker: String,
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
    #[serde(flatten)]
    pub metrics: MetricSet,
    pub score: f64,
}

/// Scored tickers, highest score first, already truncated to the requested limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RankedResult {
    pub results: Vec<ScoredTicker>,
    pub total_scanned: usize,
    pub total_failed: usize,
}

/// Exchanges with a known ticker universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nasdaq,
    Nyse,
    Ose,
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::Nasdaq, Exchange::Nyse, Exchange::Ose];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Nyse => "NYSE",
            Exchange::Ose => "OSE",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = UniverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Exchange::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UniverseError::UnknownExchange(name.to_string()))
    }
}

/// Current quote and profile fields for a single ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub ticker: String,
    pub short_name: Option<String>,
    pub current_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// Daily OHLCV bar, keyed the way charting frontends expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PriceBar {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume")]
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_keys_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Metric::from_key("ev_ebitda"), None);
    }

    #[test]
    fn test_fcf_yield_requires_positive_market_cap() {
        let mut f = Fundamentals {
            free_cash_flow: Some(5.0e9),
            market_cap: Some(100.0e9),
            ..Default::default()
        };
        assert_eq!(f.fcf_yield(), Some(0.05));

        f.market_cap = Some(0.0);
        assert_eq!(f.fcf_yield(), None);

        f.market_cap = None;
        assert_eq!(f.fcf_yield(), None);

        f.market_cap = Some(100.0e9);
        f.free_cash_flow = None;
        assert_eq!(f.fcf_yield(), None);
    }

    #[test]
    fn test_metric_set_from_fundamentals() {
        let f = Fundamentals {
            short_name: Some("Apple Inc.".to_string()),
            trailing_pe: Some(30.0),
            free_cash_flow: Some(1.0),
            market_cap: Some(20.0),
            return_on_equity: Some(1.5),
            ..Default::default()
        };
        let m = MetricSet::from(&f);
        assert_eq!(m.get(Metric::TrailingPe), Some(30.0));
        assert_eq!(m.get(Metric::FcfYield), Some(0.05));
        assert_eq!(m.get(Metric::ReturnOnEquity), Some(1.5));
        assert_eq!(m.get(Metric::Peg), None);
    }

    #[test]
    fn test_weight_config_rejects_negative_and_non_finite() {
        let mut w = WeightConfig::default();
        assert_eq!(w.get(Metric::Peg), 1.0);
        assert!(w.set(Metric::Peg, 0.0).is_ok());
        assert_eq!(w.get(Metric::Peg), 0.0);
        assert!(w.set(Metric::Peg, -1.0).is_err());
        assert!(w.set(Metric::Peg, f64::NAN).is_err());
        assert!(w.set(Metric::Peg, f64::INFINITY).is_err());
        assert_eq!(w.get(Metric::Peg), 0.0);
    }

    #[test]
    fn test_weight_config_caps_magnitude() {
        let mut w = WeightConfig::default();
        assert!(w.set(Metric::ReturnOnEquity, MAX_WEIGHT).is_ok());
        let err = w.set(Metric::ReturnOnEquity, 1e308).unwrap_err();
        assert_eq!(err.metric, "roe");
        assert!(err.to_string().contains("1000000"));
        assert_eq!(w.get(Metric::ReturnOnEquity), MAX_WEIGHT);
    }

    #[test]
    fn test_exchange_parse_is_case_insensitive() {
        assert_eq!("nasdaq".parse::<Exchange>().unwrap(), Exchange::Nasdaq);
        assert_eq!(" NYSE ".parse::<Exchange>().unwrap(), Exchange::Nyse);
        assert_eq!("Ose".parse::<Exchange>().unwrap(), Exchange::Ose);
        assert!(matches!(
            "LSE".parse::<Exchange>(),
            Err(UniverseError::UnknownExchange(name)) if name == "LSE"
        ));
    }

    #[test]
    fn test_scored_ticker_serializes_flat() {
        let t = ScoredTicker {
            ticker: "AAPL".to_string(),
            short_name: Some("Apple Inc.".to_string()),
            metrics: MetricSet::default().with(Metric::TrailingPe, 10.0),
            score: 0.1,
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["ticker"], "AAPL");
        assert_eq!(json["shortName"], "Apple Inc.");
        assert_eq!(json["pe_ttm"], 10.0);
        assert!(json["peg"].is_null());
        assert_eq!(json["score"], 0.1);
    }

    #[test]
    fn test_snapshot_uses_provider_field_names() {
        let s = StockSnapshot {
            ticker: "MSFT".to_string(),
            trailing_pe: Some(35.0),
            day_high: Some(410.0),
            ..Default::default()
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["trailingPE"], 35.0);
        assert_eq!(json["dayHigh"], 410.0);
        assert!(json["forwardPE"].is_null());
    }

    #[test]
    fn test_price_bar_date_format() {
        let bar = PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100.0,
        };
        let json = serde_json::to_value(&bar).unwrap();
        assert_eq!(json["Date"], "2024-03-01");
        assert_eq!(json["Close"], 1.5);
    }
}
