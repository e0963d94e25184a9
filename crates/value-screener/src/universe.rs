use async_trait::async_trait;
use screener_core::{Exchange, TickerUniverse, UniverseError};
use std::collections::HashSet;
use std::path::PathBuf;

pub const NASDAQ_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "AVGO", "COST", "NFLX",
    "AMD", "PEP", "ADBE", "CSCO", "INTC", "QCOM", "TXN", "AMGN", "INTU", "SBUX",
];

pub const NYSE_TICKERS: &[&str] = &[
    "JPM", "V", "JNJ", "WMT", "PG", "XOM", "MA", "HD", "CVX", "KO",
    "MRK", "ABBV", "BAC", "PFE", "DIS", "MCD", "NKE", "T", "VZ", "IBM",
];

/// Where and how to read a reference listing of an exchange's equities.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub path: PathBuf,
    pub market_column: String,
    pub symbol_column: String,
    /// Rows whose market column equals this string exactly are kept.
    pub market_name: String,
    /// Appended to every symbol, e.g. `.OL` for Oslo.
    pub suffix: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/euronext_equities.csv"),
            market_column: "Market".to_string(),
            symbol_column: "Symbol".to_string(),
            market_name: "Oslo Børs".to_string(),
            suffix: ".OL".to_string(),
        }
    }
}

fn listing_error(config: &ListingConfig, e: impl std::fmt::Display) -> UniverseError {
    UniverseError::Listing(format!("{}: {}", config.path.display(), e))
}

/// Read a semicolon-delimited listing and return suffixed symbols in file order.
///
/// Rows shorter than the header (exports often carry a few metadata lines)
/// are tolerated, and cells that are not valid UTF-8 are decoded lossily.
pub fn read_listing(config: &ListingConfig) -> Result<Vec<String>, UniverseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(&config.path)
        .map_err(|e| listing_error(config, e))?;

    let headers = reader
        .byte_headers()
        .map_err(|e| listing_error(config, e))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| String::from_utf8_lossy(h).trim() == name)
            .ok_or_else(|| listing_error(config, format!("missing column '{}'", name)))
    };
    let market_idx = column(&config.market_column)?;
    let symbol_idx = column(&config.symbol_column)?;

    let mut seen = HashSet::new();
    let mut tickers = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| listing_error(config, e))?;

        let market = record.get(market_idx).map(String::from_utf8_lossy);
        if market.as_deref().map(str::trim) != Some(config.market_name.as_str()) {
            continue;
        }

        let symbol = match record.get(symbol_idx).map(String::from_utf8_lossy) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => continue,
        };
        let ticker = format!("{}{}", symbol, config.suffix);
        if seen.insert(ticker.clone()) {
            tickers.push(ticker);
        }
    }

    Ok(tickers)
}

/// Static tables for the US exchanges, a reference listing for Oslo.
pub struct ExchangeUniverse {
    ose: ListingConfig,
}

impl ExchangeUniverse {
    pub fn new(ose: ListingConfig) -> Self {
        Self { ose }
    }
}

fn owned(table: &[&str]) -> Vec<String> {
    table.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl TickerUniverse for ExchangeUniverse {
    async fn list(&self, exchange: Exchange) -> Result<Vec<String>, UniverseError> {
        match exchange {
            Exchange::Nasdaq => Ok(owned(NASDAQ_TICKERS)),
            Exchange::Nyse => Ok(owned(NYSE_TICKERS)),
            Exchange::Ose => {
                let config = self.ose.clone();
                let tickers = tokio::task::spawn_blocking(move || read_listing(&config))
                    .await
                    .map_err(|e| UniverseError::Listing(e.to_string()))??;
                tracing::debug!("Loaded {} tickers for {}", tickers.len(), exchange);
                Ok(tickers)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn listing_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    fn config_for(file: &NamedTempFile) -> ListingConfig {
        ListingConfig {
            path: file.path().to_path_buf(),
            ..Default::default()
        }
    }

    const EURONEXT_EXPORT: &str = "\
Name;ISIN;Symbol;Market;Trading Currency
European Equities
\"14 Jun 2024\"
AKER BP;NO0010345853;AKRBP;Oslo Børs;NOK
EQUINOR;NO0010096985;EQNR;Oslo Børs;NOK
AIRBUS;NL0000235190;AIR;Euronext Paris;EUR
DNB BANK;NO0010161896;DNB;Oslo Børs;NOK
GROWTH CO;NO0000000001;GRW;Euronext Growth Oslo;NOK
EMPTY;NO0000000002; ;Oslo Børs;NOK
EQUINOR;NO0010096985;EQNR;Oslo Børs;NOK
";

    #[test]
    fn test_read_listing_filters_by_market() {
        let file = listing_file(EURONEXT_EXPORT.as_bytes());
        let tickers = read_listing(&config_for(&file)).unwrap();
        assert_eq!(tickers, vec!["AKRBP.OL", "EQNR.OL", "DNB.OL"]);
    }

    #[test]
    fn test_read_listing_market_name_is_configurable() {
        let file = listing_file(EURONEXT_EXPORT.as_bytes());
        let config = ListingConfig {
            market_name: "Euronext Paris".to_string(),
            suffix: ".PA".to_string(),
            ..config_for(&file)
        };
        assert_eq!(read_listing(&config).unwrap(), vec!["AIR.PA"]);
    }

    #[test]
    fn test_read_listing_tolerates_invalid_utf8() {
        // Latin-1 encoded market name: "Oslo B\xf8rs"
        let mut contents = b"Symbol;Market\nNHY;Oslo B".to_vec();
        contents.push(0xf8);
        contents.extend_from_slice(b"rs\nMOWI;Oslo B\xc3\xb8rs\n");
        let file = listing_file(&contents);

        let tickers = read_listing(&config_for(&file)).unwrap();
        assert_eq!(tickers, vec!["MOWI.OL"]);
    }

    #[test]
    fn test_read_listing_missing_file() {
        let config = ListingConfig {
            path: PathBuf::from("/nonexistent/listing.csv"),
            ..Default::default()
        };
        assert!(matches!(read_listing(&config), Err(UniverseError::Listing(_))));
    }

    #[test]
    fn test_read_listing_missing_column() {
        let file = listing_file(b"Name;Ticker\nEquinor;EQNR\n");
        match read_listing(&config_for(&file)) {
            Err(UniverseError::Listing(msg)) => assert!(msg.contains("missing column 'Market'")),
            other => panic!("expected listing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_universes() {
        let universe = ExchangeUniverse::new(ListingConfig::default());

        let nasdaq = universe.list(Exchange::Nasdaq).await.unwrap();
        assert_eq!(nasdaq.len(), NASDAQ_TICKERS.len());
        assert_eq!(nasdaq[0], "AAPL");

        let nyse = universe.list(Exchange::Nyse).await.unwrap();
        assert!(nyse.contains(&"JPM".to_string()));
    }

    #[tokio::test]
    async fn test_ose_universe_reads_listing() {
        let file = listing_file(EURONEXT_EXPORT.as_bytes());
        let universe = ExchangeUniverse::new(config_for(&file));
        let ose = universe.list(Exchange::Ose).await.unwrap();
        assert_eq!(ose, vec!["AKRBP.OL", "EQNR.OL", "DNB.OL"]);
    }

    #[tokio::test]
    async fn test_ose_universe_unreadable_listing_is_an_error() {
        let universe = ExchangeUniverse::new(ListingConfig {
            path: PathBuf::from("/nonexistent/listing.csv"),
            ..Default::default()
        });
        assert!(universe.list(Exchange::Ose).await.is_err());
    }
}
