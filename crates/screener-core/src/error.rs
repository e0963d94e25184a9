use thiserror::Error;

/// Failure of a single market-data lookup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Ticker not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Failure to resolve the ticker universe for an exchange.
#[derive(Error, Debug)]
pub enum UniverseError {
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Reference listing unavailable: {0}")]
    Listing(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid weight for {metric}: {value} (must be between 0 and {max})", max = crate::MAX_WEIGHT)]
pub struct WeightError {
    pub metric: &'static str,
    pub value: f64,
}
