use crate::model::FetchError;

#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self, url: &str) -> Result<f64, FetchError>;
}
