use super::Notifier;
use crate::model::{Alert, AlertType, NotifyError};
use reqwest::Client;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: i64,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: i64) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Api(e.to_string()))?;
        Ok(Self {
            bot_token,
            chat_id,
            client,
        })
    }

    fn format_message(alert: &Alert) -> String {
        let direction = match alert.alert_type {
            AlertType::PriceDrop => "dropped",
            AlertType::PriceIncrease => "rose",
        };
        format!(
            "Price {direction} for {}\nPrevious: {:.2}\nCurrent: {:.2}\nChange: {:+.1}%",
            alert.product_id,
            alert.previous_price,
            alert.current_price,
            alert.price_change_percent * 100.0,
        )
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn publish(&self, alert: &Alert) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let message = Self::format_message(alert);

        let response = match timeout(
            Duration::from_secs(10),
            self.client
                .post(&url)
                .form(&[("chat_id", self.chat_id.to_string()), ("text", message)])
                .send(),
        )
        .await
        {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return Err(NotifyError::Api(format!("send failed: {e}")));
            }
            Err(_) => {
                warn!("telegram send timed out");
                return Err(NotifyError::Unreachable);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown".into());
            warn!("telegram api responded [{status}]: {body}");
            return Err(NotifyError::Unreachable);
        }

        info!(product_id = %alert.product_id, "alert delivered");
        Ok(())
    }
}
