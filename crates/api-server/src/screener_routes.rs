use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use screener_core::{Exchange, Metric, ScoredTicker, UniverseError, WeightConfig};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{AppError, AppState};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

const DEFAULT_EXCHANGE: &str = "NASDAQ";
const WEIGHT_SUFFIX: &str = "_weight";

/// Parsed `/screener/value` query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenQuery {
    pub exchange: String,
    pub weights: WeightConfig,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ValueScreenResponse {
    pub exchange: Exchange,
    pub total_scanned: usize,
    pub total_failed: usize,
    pub results: Vec<ScoredTicker>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ExchangeList {
    pub exchanges: Vec<Exchange>,
}

// ---------------------------------------------------------------------------
// Query parsing
// ---------------------------------------------------------------------------

/// `exchange`, `limit` and any number of `<metric>_weight` parameters.
/// Weight parameters for unknown metrics are ignored.
pub fn parse_screen_query(
    params: &HashMap<String, String>,
    default_limit: usize,
) -> Result<ScreenQuery, AppError> {
    let exchange = params
        .get("exchange")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_EXCHANGE)
        .to_string();

    let limit = match params.get("limit") {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| AppError::BadRequest(format!("limit must be a non-negative integer, got {:?}", raw)))?,
        None => default_limit,
    };

    let mut weights = WeightConfig::default();
    for (key, raw) in params {
        let Some(name) = key.strip_suffix(WEIGHT_SUFFIX) else {
            continue;
        };
        let Some(metric) = Metric::from_key(name) else {
            tracing::debug!("Ignoring weight for unknown metric {}", name);
            continue;
        };
        let weight = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::BadRequest(format!("{} must be a number, got {:?}", key, raw)))?;
        weights.set(metric, weight)?;
    }

    Ok(ScreenQuery {
        exchange,
        weights,
        limit,
    })
}

/// Unknown names are rejected unless the legacy NASDAQ fallback is enabled.
pub fn resolve_exchange(name: &str, fallback: bool) -> Result<Exchange, UniverseError> {
    match name.parse::<Exchange>() {
        Ok(exchange) => Ok(exchange),
        Err(UniverseError::UnknownExchange(unknown)) if fallback => {
            tracing::warn!("Unknown exchange {:?}, falling back to {}", unknown, Exchange::Nasdaq);
            Ok(Exchange::Nasdaq)
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/screener/value",
    params(
        ("exchange" = Option<String>, Query, description = "NASDAQ, NYSE or OSE (default NASDAQ)"),
        ("limit" = Option<usize>, Query, description = "Maximum number of results"),
        ("peg_weight" = Option<f64>, Query, description = "Weight for PEG ratio; every metric key accepts `<key>_weight`")
    ),
    responses(
        (status = 200, description = "Tickers ranked by weighted value score", body = ValueScreenResponse),
        (status = 400, description = "Invalid weight, limit or exchange", body = crate::ErrorBody),
        (status = 504, description = "Screening timed out", body = crate::ErrorBody)
    ),
    tag = "Screener"
)]
pub async fn value_screen(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ValueScreenResponse>, AppError> {
    let settings = Arc::clone(&state.screener);
    let query = parse_screen_query(&params, settings.default_limit)?;
    let exchange = resolve_exchange(&query.exchange, settings.unknown_exchange_fallback)?;

    let tickers = state.universe.list(exchange).await?;
    tracing::info!(
        "Value screen: exchange={}, {} tickers, limit={}",
        exchange,
        tickers.len(),
        query.limit
    );

    let ranked = tokio::time::timeout(
        settings.timeout,
        value_screener::screen(
            Arc::clone(&state.provider),
            tickers,
            &query.weights,
            query.limit,
            settings.concurrency,
        ),
    )
    .await
    .map_err(|_| AppError::Timeout(settings.timeout))?;

    Ok(Json(ValueScreenResponse {
        exchange,
        total_scanned: ranked.total_scanned,
        total_failed: ranked.total_failed,
        results: ranked.results,
    }))
}

#[utoipa::path(
    get,
    path = "/screener/exchanges",
    responses((status = 200, description = "Exchanges with a ticker universe", body = ExchangeList)),
    tag = "Screener"
)]
pub async fn list_exchanges() -> Json<ExchangeList> {
    Json(ExchangeList {
        exchanges: Exchange::ALL.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn screener_routes() -> Router<AppState> {
    Router::new()
        .route("/screener/value", get(value_screen))
        .route("/screener/exchanges", get(list_exchanges))
}
