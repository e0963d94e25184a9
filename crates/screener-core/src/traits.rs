use async_trait::async_trait;
use crate::{Exchange, Fundamentals, PriceBar, ProviderError, StockSnapshot, UniverseError};

/// Remote lookup of per-ticker market data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn snapshot(&self, ticker: &str) -> Result<StockSnapshot, ProviderError>;

    /// Daily bars over the last five years, oldest first.
    async fn history(&self, ticker: &str) -> Result<Vec<PriceBar>, ProviderError>;

    async fn fundamentals(&self, ticker: &str) -> Result<Fundamentals, ProviderError>;
}

/// Produces the ordered set of tickers to evaluate for an exchange.
#[async_trait]
pub trait TickerUniverse: Send + Sync {
    async fn list(&self, exchange: Exchange) -> Result<Vec<String>, UniverseError>;
}
