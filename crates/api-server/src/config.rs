//! Environment-driven configuration.
//!
//! `.env` is loaded by [`crate::run_server`] before this module reads the
//! process environment. Unparseable values fall back to their defaults.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use value_screener::ListingConfig;
use yahoo_client::YahooConfig;

/// Knobs for the `/screener/value` endpoint.
#[derive(Debug, Clone)]
pub struct ScreenerSettings {
    /// Maximum concurrent provider lookups per request.
    pub concurrency: usize,
    /// Upper bound on one screening request; outstanding lookups are aborted after it.
    pub timeout: Duration,
    pub default_limit: usize,
    /// Screen NASDAQ instead of rejecting an unrecognized exchange name.
    pub unknown_exchange_fallback: bool,
}

impl Default for ScreenerSettings {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout: Duration::from_secs(60),
            default_limit: 20,
            unknown_exchange_fallback: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub yahoo: YahooConfig,
    pub listing: ListingConfig,
    pub screener: ScreenerSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let yahoo_defaults = YahooConfig::default();
        let listing_defaults = ListingConfig::default();
        let screener_defaults = ScreenerSettings::default();

        let string_or = |key: &str, default: String| lookup(key).unwrap_or(default);

        Self {
            host: string_or("BIND_ADDR", "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 8000),
            yahoo: YahooConfig {
                base_url: string_or("YAHOO_BASE_URL", yahoo_defaults.base_url),
                cookie_url: string_or("YAHOO_COOKIE_URL", yahoo_defaults.cookie_url),
                use_crumb: parse_bool_or(&lookup, "YAHOO_USE_CRUMB", yahoo_defaults.use_crumb),
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "YAHOO_TIMEOUT_SECS",
                    yahoo_defaults.timeout.as_secs(),
                )),
                user_agent: string_or("YAHOO_USER_AGENT", yahoo_defaults.user_agent),
            },
            listing: ListingConfig {
                path: lookup("OSE_LISTING_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(listing_defaults.path),
                market_column: string_or("OSE_MARKET_COLUMN", listing_defaults.market_column),
                symbol_column: string_or("OSE_SYMBOL_COLUMN", listing_defaults.symbol_column),
                market_name: string_or("OSE_MARKET_NAME", listing_defaults.market_name),
                suffix: string_or("OSE_SYMBOL_SUFFIX", listing_defaults.suffix),
            },
            screener: ScreenerSettings {
                concurrency: parse_or(&lookup, "SCREENER_CONCURRENCY", screener_defaults.concurrency)
                    .max(1),
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "SCREENER_TIMEOUT_SECS",
                    screener_defaults.timeout.as_secs(),
                )),
                default_limit: parse_or(
                    &lookup,
                    "SCREENER_DEFAULT_LIMIT",
                    screener_defaults.default_limit,
                ),
                unknown_exchange_fallback: parse_bool_or(
                    &lookup,
                    "UNKNOWN_EXCHANGE_FALLBACK",
                    screener_defaults.unknown_exchange_fallback,
                ),
            },
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

fn parse_bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        Some(v) => {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, v, default);
            default
        }
        None => default,
    }
}
