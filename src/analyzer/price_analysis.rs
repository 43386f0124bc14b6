use crate::model::{AnalyticsResult, HistoryRecord, Recommendation, Trend, Volatility};

/// Relative dead-band around the window's first price when classifying trend;
/// moves inside it count as noise.
pub const TREND_DEADBAND: f64 = 0.01;

/// Coefficient-of-variation cutoffs for the volatility buckets:
/// below `VOLATILITY_MEDIUM` is LOW, below `VOLATILITY_HIGH` is MEDIUM.
pub const VOLATILITY_MEDIUM: f64 = 0.05;
pub const VOLATILITY_HIGH: f64 = 0.15;

/// A latest price within this margin of the historical low still counts as
/// being at the low for the buy recommendation.
pub const BUY_MARGIN: f64 = 0.03;

/// Derives trend, volatility, recommendation and savings from a product's
/// history, oldest record first. Only the `window` most recent records are
/// considered (all, if fewer exist). Pure: identical input yields identical
/// output, and an empty history yields the documented defaults.
pub fn analyze(product_name: &str, history: &[HistoryRecord], window: usize) -> AnalyticsResult {
    let start = history.len().saturating_sub(window);
    let recent = &history[start..];
    let prices: Vec<f64> = recent.iter().map(|r| r.price).collect();

    if prices.is_empty() {
        return AnalyticsResult {
            product_name: product_name.to_string(),
            current_price: 0.0,
            price_change: None,
            recommendation: Recommendation::Hold,
            trend: Trend::Stable,
            volatility: Volatility::Low,
            historical_low: 0.0,
            potential_savings: 0.0,
        };
    }

    let latest = prices[prices.len() - 1];
    let historical_low = prices.iter().copied().fold(f64::INFINITY, f64::min);
    let trend = classify_trend(&prices);
    let volatility = classify_volatility(&prices);

    AnalyticsResult {
        product_name: product_name.to_string(),
        current_price: latest,
        price_change: recent[recent.len() - 1].price_change_percent,
        recommendation: recommend(trend, latest, historical_low),
        trend,
        volatility,
        historical_low,
        potential_savings: (latest - historical_low).max(0.0),
    }
}

fn classify_trend(prices: &[f64]) -> Trend {
    if prices.len() < 2 {
        return Trend::Stable;
    }
    let first = prices[0];
    let last = prices[prices.len() - 1];
    if last > first * (1.0 + TREND_DEADBAND) {
        Trend::Increasing
    } else if last < first * (1.0 - TREND_DEADBAND) {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

fn classify_volatility(prices: &[f64]) -> Volatility {
    if prices.len() < 2 {
        return Volatility::Low;
    }
    let count = prices.len() as f64;
    let mean = prices.iter().sum::<f64>() / count;
    if mean <= f64::EPSILON {
        return Volatility::Low;
    }
    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / count;
    let cv = variance.sqrt() / mean;

    if cv < VOLATILITY_MEDIUM {
        Volatility::Low
    } else if cv < VOLATILITY_HIGH {
        Volatility::Medium
    } else {
        Volatility::High
    }
}

fn recommend(trend: Trend, latest: f64, historical_low: f64) -> Recommendation {
    if trend == Trend::Increasing {
        return Recommendation::Wait;
    }
    if latest <= historical_low * (1.0 + BUY_MARGIN) {
        Recommendation::Buy
    } else {
        Recommendation::Hold
    }
}
