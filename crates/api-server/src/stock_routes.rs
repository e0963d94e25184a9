//! Single-ticker API Routes
//!
//! Thin pass-through to the market data provider for one symbol.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use screener_core::{PriceBar, StockSnapshot};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};

#[derive(Deserialize, utoipa::IntoParams)]
pub struct TickerQuery {
    /// Stock ticker symbol
    pub ticker: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HistoryResponse {
    pub ticker: String,
    pub history: Vec<PriceBar>,
}

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/stocks", get(get_stock))
        .route("/stocks/history", get(get_stock_history))
}

fn ticker_from(query: Result<Query<TickerQuery>, QueryRejection>) -> Result<String, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let ticker = query.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(AppError::BadRequest("ticker must not be empty".to_string()));
    }
    Ok(ticker)
}

#[utoipa::path(
    get,
    path = "/stocks",
    params(TickerQuery),
    responses(
        (status = 200, description = "Current quote and profile fields", body = StockSnapshot),
        (status = 404, description = "Unknown ticker", body = crate::ErrorBody)
    ),
    tag = "Stocks"
)]
pub async fn get_stock(
    State(state): State<AppState>,
    query: Result<Query<TickerQuery>, QueryRejection>,
) -> Result<Json<StockSnapshot>, AppError> {
    let ticker = ticker_from(query)?;
    let snapshot = state.provider.snapshot(&ticker).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/stocks/history",
    params(TickerQuery),
    responses(
        (status = 200, description = "Five years of daily bars, oldest first", body = HistoryResponse),
        (status = 404, description = "Unknown ticker", body = crate::ErrorBody)
    ),
    tag = "Stocks"
)]
pub async fn get_stock_history(
    State(state): State<AppState>,
    query: Result<Query<TickerQuery>, QueryRejection>,
) -> Result<Json<HistoryResponse>, AppError> {
    let ticker = ticker_from(query)?;
    let history = state.provider.history(&ticker).await?;

    tracing::debug!("History for {}: {} bars", ticker, history.len());

    Ok(Json(HistoryResponse { ticker, history }))
}
