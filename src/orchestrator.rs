use crate::alerts::AlertEngine;
use crate::config::RunConfig;
use crate::detector;
use crate::fetcher::PriceSource;
use crate::model::{FetchError, HistoryRecord, Product, RunSummary, StorageError};
use crate::notifier::Notifier;
use crate::storage::{SharedStorage, Storage};
use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Days after which storage may expire a history row.
const HISTORY_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error(transparent)]
    Fetch(FetchError),
    #[error("{1}")]
    Storage(&'static str, StorageError),
}

impl StepError {
    fn step(&self) -> &'static str {
        match self {
            StepError::Fetch(FetchError::Network(_)) => "fetch",
            StepError::Fetch(FetchError::Parse) => "parse",
            StepError::Fetch(FetchError::Blocked(_)) => "blocked",
            StepError::Storage(step, _) => step,
        }
    }
}

/// Drives one batch run across all active products, isolating per-product
/// failures. Collaborators are injected so tests can substitute fakes.
pub struct Orchestrator {
    storage: SharedStorage,
    notifier: Arc<dyn Notifier>,
    source: Arc<dyn PriceSource>,
    alert_engine: AlertEngine,
    time_budget: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        storage: SharedStorage,
        notifier: Arc<dyn Notifier>,
        source: Arc<dyn PriceSource>,
        config: &RunConfig,
    ) -> Self {
        Self {
            storage,
            notifier,
            source,
            alert_engine: AlertEngine::new(config.alert_threshold),
            time_budget: None,
        }
    }

    /// Bounds the run to a wall-clock budget; products not reached by the
    /// deadline are abandoned, leaving a well-defined prefix updated.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub async fn run_batch(&self) -> RunSummary {
        let deadline = self.time_budget.map(|budget| Instant::now() + budget);

        let products = match self.storage.lock().await.list_active_products() {
            Ok(products) => products,
            Err(e) => {
                warn!("failed to list active products: {e}");
                return RunSummary::default();
            }
        };
        info!("processing {} active products", products.len());

        // One sequential chain per domain keeps same-site requests spaced by
        // the fetcher's delay; distinct domains proceed concurrently.
        let groups = group_by_domain(products);
        let tasks: Vec<_> = groups
            .into_iter()
            .map(|(domain, group)| self.process_domain(domain, group, deadline))
            .collect();
        let partials = join_all(tasks).await;

        let mut summary = RunSummary::default();
        for partial in partials {
            summary.succeeded += partial.succeeded;
            summary.failed += partial.failed;
            summary.alerts_sent += partial.alerts_sent;
        }
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            alerts_sent = summary.alerts_sent,
            "batch finished"
        );
        summary
    }

    async fn process_domain(
        &self,
        domain: String,
        products: Vec<Product>,
        deadline: Option<Instant>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for (index, product) in products.iter().enumerate() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(
                        domain = %domain,
                        abandoned = products.len() - index,
                        "time budget exhausted, abandoning remaining products"
                    );
                    break;
                }
            }
            match self.process_product(product).await {
                Ok(alerted) => {
                    summary.succeeded += 1;
                    if alerted {
                        summary.alerts_sent += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(product_id = %product.id, step = e.step(), "product skipped: {e}");
                }
            }
        }
        summary
    }

    /// Full pipeline for one product: fetch, detect, persist history, decide,
    /// persist and publish the alert, update the product row.
    async fn process_product(&self, product: &Product) -> Result<bool, StepError> {
        info!(product_id = %product.id, url = %product.url, "tracking product");

        let price = self
            .source
            .fetch_price(&product.url)
            .await
            .map_err(StepError::Fetch)?;
        let delta = detector::detect(product.last_price, price);
        let now = Utc::now();

        let record = HistoryRecord {
            product_id: product.id.clone(),
            timestamp: now,
            price,
            price_change: delta.change,
            price_change_percent: delta.percent,
            expires_at: Some(now + ChronoDuration::days(HISTORY_EXPIRY_DAYS)),
        };
        self.storage
            .lock()
            .await
            .append_history(&record)
            .map_err(|e| StepError::Storage("append_history", e))?;

        let mut alerted = false;
        if let Some(previous) = product.last_price {
            if let Some(alert) =
                self.alert_engine
                    .decide(&product.id, previous, price, delta.percent, now)
            {
                self.storage
                    .lock()
                    .await
                    .append_alert(&alert)
                    .map_err(|e| StepError::Storage("append_alert", e))?;
                // Delivery is independent of persistence; a failed publish
                // must not lose the stored alert.
                if let Err(e) = self.notifier.publish(&alert).await {
                    warn!(product_id = %product.id, "alert delivery failed: {e}");
                }
                alerted = true;
            }
        }

        self.storage
            .lock()
            .await
            .update_product_price(&product.id, price, now)
            .map_err(|e| StepError::Storage("update_product", e))?;

        info!(product_id = %product.id, price, "tracked");
        Ok(alerted)
    }
}

fn group_by_domain(products: Vec<Product>) -> HashMap<String, Vec<Product>> {
    let mut groups: HashMap<String, Vec<Product>> = HashMap::new();
    for product in products {
        let domain = reqwest::Url::parse(&product.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        groups.entry(domain).or_default().push(product);
    }
    groups
}
