use screener_core::{MarketDataProvider, ProviderError, RankedResult, ScoredTicker, WeightConfig};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::scorer::score_ticker;

/// Outcome of looking up and scoring a single ticker.
#[derive(Debug, Clone)]
pub struct TickerLookup {
    pub ticker: String,
    pub outcome: Result<ScoredTicker, ProviderError>,
}

/// Drop failed lookups, sort by score descending and keep the first `limit`.
///
/// The sort is stable, so tickers with equal scores keep the order in which
/// `lookups` lists them.
pub fn rank(lookups: Vec<TickerLookup>, limit: usize) -> RankedResult {
    let total_scanned = lookups.len();
    let mut total_failed = 0;
    let mut scored = Vec::with_capacity(total_scanned);

    for lookup in lookups {
        match lookup.outcome {
            Ok(ticker) => scored.push(ticker),
            Err(e) => {
                total_failed += 1;
                tracing::warn!(ticker = %lookup.ticker, error = %e, "Skipping ticker after failed lookup");
            }
        }
    }

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);

    RankedResult {
        results: scored,
        total_scanned,
        total_failed,
    }
}

/// Fetch fundamentals for every ticker (at most `concurrency` at a time),
/// score them and rank the survivors.
///
/// Dropping the returned future aborts every outstanding lookup.
pub async fn screen(
    provider: Arc<dyn MarketDataProvider>,
    tickers: Vec<String>,
    weights: &WeightConfig,
    limit: usize,
    concurrency: usize,
) -> RankedResult {
    let total = tickers.len();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let weights = Arc::new(weights.clone());

    let mut tasks = JoinSet::new();
    for (index, ticker) in tickers.into_iter().enumerate() {
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);
        let weights = Arc::clone(&weights);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = provider
                .fundamentals(&ticker)
                .await
                .map(|f| score_ticker(&ticker, &f, &weights));
            (index, TickerLookup { ticker, outcome })
        });
    }

    let mut lookups = Vec::with_capacity(total);
    let mut lost = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => lookups.push(entry),
            Err(e) => {
                lost += 1;
                tracing::error!("Lookup task failed: {}", e);
            }
        }
    }

    // Back to universe order so ties resolve deterministically.
    lookups.sort_by_key(|(index, _)| *index);
    let lookups = lookups.into_iter().map(|(_, lookup)| lookup).collect();

    let mut result = rank(lookups, limit);
    result.total_scanned = total;
    result.total_failed += lost;

    tracing::info!(
        scanned = result.total_scanned,
        failed = result.total_failed,
        returned = result.results.len(),
        "Screen complete"
    );
    result
}
