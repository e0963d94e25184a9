//! HTTP surface for the value screener.
//!
//! Everything is wired explicitly in [`run_server`]: the market data provider
//! and the ticker universe are built from [`AppConfig`] and handed to
//! [`build_router`] through [`AppState`].

pub mod config;
pub mod screener_routes;
pub mod stock_routes;

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use screener_core::{MarketDataProvider, ProviderError, TickerUniverse, UniverseError, WeightError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use value_screener::ExchangeUniverse;
use yahoo_client::YahooClient;

pub use config::{AppConfig, ScreenerSettings};


/// Shared, immutable per-process state. Each request builds its own working set.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn MarketDataProvider>,
    pub universe: Arc<dyn TickerUniverse>,
    pub screener: Arc<ScreenerSettings>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        universe: Arc<dyn TickerUniverse>,
        screener: ScreenerSettings,
    ) -> Self {
        Self {
            provider,
            universe,
            screener: Arc::new(screener),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Provider(ProviderError),
    Universe(UniverseError),
    Timeout(Duration),
    Internal(anyhow::Error),
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        AppError::Provider(e)
    }
}

impl From<UniverseError> for AppError {
    fn from(e: UniverseError) -> Self {
        AppError::Universe(e)
    }
}

impl From<WeightError> for AppError {
    fn from(e: WeightError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Provider(e @ ProviderError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            AppError::Provider(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Universe(e @ UniverseError::UnknownExchange(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            AppError::Universe(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("Screening did not finish within {}s", limit.as_secs_f64()),
            ),
            AppError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("{} {}", status.as_u16(), message);
        } else {
            tracing::debug!("{} {}", status.as_u16(), message);
        }

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Value Screener API"),
    paths(
        stock_routes::get_stock,
        stock_routes::get_stock_history,
        screener_routes::value_screen,
        screener_routes::list_exchanges,
        health
    ),
    components(schemas(
        screener_core::StockSnapshot,
        screener_core::PriceBar,
        screener_core::MetricSet,
        screener_core::ScoredTicker,
        screener_core::Exchange,
        stock_routes::HistoryResponse,
        screener_routes::ValueScreenResponse,
        screener_routes::ExchangeList,
        ErrorBody
    )),
    tags(
        (name = "Stocks", description = "Single-ticker quote and price history"),
        (name = "Screener", description = "Weighted value screening per exchange")
    )
)]
pub struct ApiDoc;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up")),
    tag = "Stocks"
)]
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(stock_routes::stock_routes())
        .merge(screener_routes::screener_routes())
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::very_permissive()),
        )
}

pub const LOG_FORMAT_VAR: &str = "RUST_LOG_FORMAT";

fn json_logging(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup(LOG_FORMAT_VAR)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// `RUST_LOG` picks the filter; `RUST_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "api_server=info,value_screener=info,yahoo_client=warn,tower_http=info".into()
    });

    if json_logging(|key| std::env::var(key).ok()) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        "Starting value screener (yahoo={}, ose_listing={}, concurrency={})",
        config.yahoo.base_url,
        config.listing.path.display(),
        config.screener.concurrency
    );

    let provider: Arc<dyn MarketDataProvider> = Arc::new(YahooClient::new(config.yahoo.clone()));
    let universe: Arc<dyn TickerUniverse> = Arc::new(ExchangeUniverse::new(config.listing.clone()));
    let state = AppState::new(provider, universe, config.screener.clone());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("API server listening on {}", address);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
