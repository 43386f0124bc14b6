use crate::model::{Alert, AlertType};
use chrono::{DateTime, Duration, Utc};

/// Days after which storage may expire an alert row.
const ALERT_EXPIRY_DAYS: i64 = 90;

/// Decides whether a detected change is worth an alert.
pub struct AlertEngine {
    threshold: f64,
}

impl AlertEngine {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Returns an alert when the relative change reaches the threshold.
    ///
    /// An undefined relative change (baseline record, or a zero previous
    /// price) never alerts. At most one alert per product comes out of a
    /// batch run because this is invoked once per product.
    pub fn decide(
        &self,
        product_id: &str,
        previous_price: f64,
        current_price: f64,
        price_change_percent: Option<f64>,
        at: DateTime<Utc>,
    ) -> Option<Alert> {
        let percent = price_change_percent?;
        if percent.abs() < self.threshold {
            return None;
        }

        let alert_type = if percent < 0.0 {
            AlertType::PriceDrop
        } else {
            AlertType::PriceIncrease
        };

        Some(Alert {
            alert_id: format!("{product_id}_{}", at.timestamp()),
            product_id: product_id.to_string(),
            alert_type,
            previous_price,
            current_price,
            price_change_percent: percent,
            timestamp: at,
            expires_at: Some(at + Duration::days(ALERT_EXPIRY_DAYS)),
        })
    }
}
