// Core records: Product, HistoryRecord, Alert, AnalyticsResult
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tracked product. Created by an external management action; `last_price`
/// and `last_updated` are written only by the orchestrator after a
/// successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "product_id")]
    pub id: String,
    pub url: String,
    #[serde(rename = "product_name")]
    pub display_name: String,
    pub active: bool,
    pub last_price: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One observation in a product's price series. Append-only; the change
/// fields are empty on the baseline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub product_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub price_change: Option<f64>,
    pub price_change_percent: Option<f64>,
    /// Storage-side expiry marker, not part of the wire payload.
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PriceDrop,
    PriceIncrease,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::PriceDrop => "PRICE_DROP",
            AlertType::PriceIncrease => "PRICE_INCREASE",
        }
    }
}

/// Immutable record of a threshold-crossing price change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(skip)]
    pub alert_id: String,
    pub product_id: String,
    pub alert_type: AlertType,
    pub previous_price: f64,
    pub current_price: f64,
    pub price_change_percent: f64,
    pub timestamp: DateTime<Utc>,
    /// Storage-side expiry marker, not part of the wire payload.
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Volatility {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Buy,
    Wait,
    Hold,
}

/// Payload answered to analytics reads. `price_change` carries the relative
/// change of the most recent transition in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub product_name: String,
    pub current_price: f64,
    pub price_change: Option<f64>,
    pub recommendation: Recommendation,
    pub trend: Trend,
    pub volatility: Volatility,
    pub historical_low: f64,
    pub potential_savings: f64,
}

/// Outcome counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub alerts_sent: usize,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failure, timeout or non-success response. Retried once.
    #[error("network error: {0}")]
    Network(String),
    /// Content retrieved but no price found. Retrying will not help.
    #[error("no price found in page content")]
    Parse,
    /// Response looks like a bot-mitigation challenge. Retrying will not help.
    #[error("blocked by bot mitigation ({0})")]
    Blocked(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("not found")]
    NotFound,
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}

impl From<chrono::ParseError> for StorageError {
    fn from(e: chrono::ParseError) -> Self {
        StorageError::Database(format!("invalid datetime: {e}"))
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier api error: {0}")]
    Api(String),
    #[error("notifier unreachable")]
    Unreachable,
}

/// Fatal: a run cannot proceed without a usable configuration snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("config key {key} has an invalid value: {reason}")]
    InvalidValue { key: String, reason: String },
}
