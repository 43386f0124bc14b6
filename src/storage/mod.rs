// Storage module: the durable-store contract plus the SQLite implementation.

pub mod sqlite;

use crate::model::{Alert, HistoryRecord, Product, StorageError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

pub use sqlite::SqliteStorage;

/// Contract the pipeline needs from durable storage. Every write is a
/// single-row atomic statement; no multi-item transactions are assumed.
pub trait Storage: Send {
    /// External management action: register or replace a tracked product.
    fn put_product(&self, product: &Product) -> Result<(), StorageError>;
    fn get_product(&self, id: &str) -> Result<Option<Product>, StorageError>;
    fn list_active_products(&self) -> Result<Vec<Product>, StorageError>;
    fn update_product_price(
        &self,
        id: &str,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    fn append_history(&self, record: &HistoryRecord) -> Result<(), StorageError>;
    /// The `window` most recent records, returned in ascending timestamp order.
    fn query_history(
        &self,
        product_id: &str,
        window: usize,
    ) -> Result<Vec<HistoryRecord>, StorageError>;
    fn append_alert(&self, alert: &Alert) -> Result<(), StorageError>;
}

pub type SharedStorage = Arc<Mutex<Box<dyn Storage>>>;

pub fn shared(storage: impl Storage + 'static) -> SharedStorage {
    Arc::new(Mutex::new(Box::new(storage)))
}
