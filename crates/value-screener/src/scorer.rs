use screener_core::{Fundamentals, Metric, MetricKind, MetricSet, ScoredTicker, WeightConfig};

/// Weighted average of per-metric contributions.
///
/// Inverse metrics contribute `weight / value`, direct metrics `weight * value`.
/// A metric only counts when its value is present, finite and strictly
/// positive; zero and negative values are treated exactly like missing data.
/// Returns 0 when nothing qualified (or every qualifying weight is 0).
/// Overflow saturates at `f64::MAX` so the score always serializes as a number.
pub fn score(metrics: &MetricSet, weights: &WeightConfig) -> f64 {
    let mut total = 0.0;
    let mut weight_total = 0.0;

    for metric in Metric::ALL {
        let value = match metrics.get(metric) {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => continue,
        };
        let weight = weights.get(metric);

        total += match metric.kind() {
            MetricKind::Inverse => weight / value,
            MetricKind::Direct => weight * value,
        };
        weight_total += weight;
    }

    if weight_total > 0.0 {
        (total / weight_total).min(f64::MAX)
    } else {
        0.0
    }
}

pub fn score_ticker(ticker: &str, fundamentals: &Fundamentals, weights: &WeightConfig) -> ScoredTicker {
    let metrics = MetricSet::from(fundamentals);
    let score = score(&metrics, weights);

    ScoredTicker {
        ticker: ticker.to_string(),
        short_name: fundamentals.short_name.clone(),
        metrics,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_all_absent_scores_zero() {
        assert_eq!(score(&MetricSet::default(), &WeightConfig::default()), 0.0);
    }

    #[test]
    fn test_single_inverse_metric() {
        let mut weights = WeightConfig::default();
        weights.set(Metric::PriceToBook, 3.0).unwrap();
        let metrics = MetricSet::default().with(Metric::PriceToBook, 4.0);
        assert!(approx(score(&metrics, &weights), 0.25));
    }

    #[test]
    fn test_single_direct_metric() {
        let mut weights = WeightConfig::default();
        weights.set(Metric::ReturnOnEquity, 2.5).unwrap();
        let metrics = MetricSet::default().with(Metric::ReturnOnEquity, 0.18);
        assert!(approx(score(&metrics, &weights), 0.18));
    }

    #[test]
    fn test_trailing_pe_only() {
        let metrics = MetricSet::default().with(Metric::TrailingPe, 10.0);
        assert!(approx(score(&metrics, &WeightConfig::default()), 0.1));
    }

    #[test]
    fn test_dividend_and_roe() {
        let metrics = MetricSet::default()
            .with(Metric::DividendYield, 0.02)
            .with(Metric::ReturnOnEquity, 0.15);
        assert!(approx(score(&metrics, &WeightConfig::default()), 0.085));
    }

    #[test]
    fn test_non_positive_values_are_ignored() {
        let base = MetricSet::default().with(Metric::ForwardPe, 20.0);
        let noisy = base
            .clone()
            .with(Metric::TrailingPe, -15.0)
            .with(Metric::Peg, 0.0)
            .with(Metric::EarningsGrowth, -0.3)
            .with(Metric::DividendYield, 0.0);

        let weights = WeightConfig::default();
        assert_eq!(score(&noisy, &weights), score(&base, &weights));
        assert!(approx(score(&noisy, &weights), 0.05));
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let metrics = MetricSet::default()
            .with(Metric::TrailingPe, f64::INFINITY)
            .with(Metric::PriceToSales, f64::NAN)
            .with(Metric::PriceToBook, 2.0);
        assert!(approx(score(&metrics, &WeightConfig::default()), 0.5));
    }

    #[test]
    fn test_zero_weight_disables_metric() {
        let mut weights = WeightConfig::default();
        weights.set(Metric::TrailingPe, 0.0).unwrap();
        let metrics = MetricSet::default()
            .with(Metric::TrailingPe, 5.0)
            .with(Metric::PriceToBook, 2.0);
        assert!(approx(score(&metrics, &weights), 0.5));
    }

    #[test]
    fn test_all_weights_zero_scores_zero() {
        let mut weights = WeightConfig::default();
        for metric in Metric::ALL {
            weights.set(metric, 0.0).unwrap();
        }
        let metrics = MetricSet::default()
            .with(Metric::TrailingPe, 5.0)
            .with(Metric::ReturnOnEquity, 0.2);
        let s = score(&metrics, &weights);
        assert_eq!(s, 0.0);
        assert!(!s.is_nan());
    }

    #[test]
    fn test_overflow_saturates() {
        let mut weights = WeightConfig::default();
        weights.set(Metric::ReturnOnEquity, screener_core::MAX_WEIGHT).unwrap();
        let huge = MetricSet::default().with(Metric::ReturnOnEquity, 1e305);
        assert_eq!(score(&huge, &weights), f64::MAX);

        let tiny = MetricSet::default().with(Metric::TrailingPe, 1e-310);
        let s = score(&tiny, &WeightConfig::default());
        assert!(s.is_finite());
        assert_eq!(s, f64::MAX);
    }

    #[test]
    fn test_weighted_mix() {
        let mut weights = WeightConfig::default();
        weights.set(Metric::TrailingPe, 2.0).unwrap();
        let metrics = MetricSet::default()
            .with(Metric::TrailingPe, 10.0)
            .with(Metric::ReturnOnEquity, 0.4);
        // (2/10 + 1*0.4) / (2 + 1)
        assert!(approx(score(&metrics, &weights), 0.2));
    }

    #[test]
    fn test_fcf_yield_derivation_feeds_score() {
        let with_cap = Fundamentals {
            free_cash_flow: Some(4.0),
            market_cap: Some(100.0),
            ..Default::default()
        };
        let scored = score_ticker("XYZ", &with_cap, &WeightConfig::default());
        assert_eq!(scored.metrics.fcf_yield, Some(0.04));
        assert!(approx(scored.score, 0.04));

        let zero_cap = Fundamentals {
            free_cash_flow: Some(4.0),
            market_cap: Some(0.0),
            ..Default::default()
        };
        let scored = score_ticker("XYZ", &zero_cap, &WeightConfig::default());
        assert_eq!(scored.metrics.fcf_yield, None);
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn test_score_ticker_keeps_name_and_metrics() {
        let f = Fundamentals {
            short_name: Some("Equinor ASA".to_string()),
            trailing_pe: Some(8.0),
            ..Default::default()
        };
        let scored = score_ticker("EQNR.OL", &f, &WeightConfig::default());
        assert_eq!(scored.ticker, "EQNR.OL");
        assert_eq!(scored.short_name.as_deref(), Some("Equinor ASA"));
        assert_eq!(scored.metrics.pe_ttm, Some(8.0));
        assert!(approx(scored.score, 0.125));
    }
}
