// Notifier module: delivery channel for alert records.

pub mod telegram;

use crate::model::{Alert, NotifyError};

pub use telegram::TelegramNotifier;

/// Delivery channel for alerts. Failures are logged by the caller and never
/// abort a batch; the alert record is persisted regardless.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Fallback channel used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        tracing::info!(
            product_id = %alert.product_id,
            alert_type = alert.alert_type.as_str(),
            previous_price = alert.previous_price,
            current_price = alert.current_price,
            "price alert"
        );
        Ok(())
    }
}
