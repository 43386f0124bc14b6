use super::Storage;
use crate::model::{Alert, HistoryRecord, Product, StorageError};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens the database file and runs migrations.
    pub fn new(db_path: &str) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS products (
                product_id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                product_name TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                last_price REAL,
                last_updated TEXT
            );

            CREATE TABLE IF NOT EXISTS price_history (
                product_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                price REAL NOT NULL,
                price_change REAL,
                price_change_percent REAL,
                PRIMARY KEY (product_id, timestamp)
            );

            CREATE TABLE IF NOT EXISTS alerts (
                alert_id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                previous_price REAL NOT NULL,
                current_price REAL NOT NULL,
                price_change_percent REAL NOT NULL,
                timestamp TEXT NOT NULL
            );
            ",
        )?;

        // Expiry markers arrived after the initial schema.
        Self::migrate_add_column_if_missing(&conn, "price_history", "expires_at", "TEXT")?;
        Self::migrate_add_column_if_missing(&conn, "alerts", "expires_at", "TEXT")?;

        Ok(Self { conn })
    }

    /// Adds a column to an existing table when it is not there yet.
    fn migrate_add_column_if_missing(
        conn: &Connection,
        table: &str,
        column: &str,
        column_def: &str,
    ) -> Result<(), StorageError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let existing_columns: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<_, _>>()?;

        if !existing_columns.iter().any(|c| c == column) {
            conn.execute(
                &format!("ALTER TABLE {table} ADD COLUMN {column} {column_def}"),
                [],
            )?;
        }

        Ok(())
    }

    fn map_product(row: &Row) -> Result<Product, rusqlite::Error> {
        let last_updated: Option<String> = row.get(5)?;
        let last_updated = match last_updated {
            Some(raw) => Some(raw.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };

        Ok(Product {
            id: row.get(0)?,
            url: row.get(1)?,
            display_name: row.get(2)?,
            active: row.get(3)?,
            last_price: row.get(4)?,
            last_updated,
        })
    }

    fn map_history(row: &Row) -> Result<HistoryRecord, rusqlite::Error> {
        let timestamp: String = row.get(1)?;
        let timestamp = timestamp.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let expires_at: Option<String> = row.get(5)?;
        let expires_at = match expires_at {
            Some(raw) => Some(raw.parse().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?),
            None => None,
        };

        Ok(HistoryRecord {
            product_id: row.get(0)?,
            timestamp,
            price: row.get(2)?,
            price_change: row.get(3)?,
            price_change_percent: row.get(4)?,
            expires_at,
        })
    }
}

impl Storage for SqliteStorage {
    fn put_product(&self, product: &Product) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO products (
                product_id, url, product_name, active, last_price, last_updated
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &product.id,
                &product.url,
                &product.display_name,
                product.active,
                product.last_price,
                product.last_updated.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn get_product(&self, id: &str) -> Result<Option<Product>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, url, product_name, active, last_price, last_updated
             FROM products WHERE product_id = ?1",
        )?;

        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(Self::map_product(row)?)),
            None => Ok(None),
        }
    }

    fn list_active_products(&self) -> Result<Vec<Product>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, url, product_name, active, last_price, last_updated
             FROM products WHERE active = 1 ORDER BY product_id ASC",
        )?;

        let rows = stmt.query_map([], |row| Self::map_product(row))?;
        let mut products = Vec::new();
        for product in rows {
            products.push(product?);
        }

        Ok(products)
    }

    fn update_product_price(
        &self,
        id: &str,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let updated = self.conn.execute(
            "UPDATE products SET last_price = ?2, last_updated = ?3 WHERE product_id = ?1",
            params![id, price, timestamp.to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    fn append_history(&self, record: &HistoryRecord) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO price_history (
                product_id, timestamp, price, price_change, price_change_percent, expires_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &record.product_id,
                record.timestamp.to_rfc3339(),
                record.price,
                record.price_change,
                record.price_change_percent,
                record.expires_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn query_history(
        &self,
        product_id: &str,
        window: usize,
    ) -> Result<Vec<HistoryRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, timestamp, price, price_change, price_change_percent, expires_at
             FROM price_history WHERE product_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![product_id, window as i64], |row| {
            Self::map_history(row)
        })?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }

        // Most-recent-first from the index; callers expect oldest first.
        records.reverse();
        Ok(records)
    }

    fn append_alert(&self, alert: &Alert) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO alerts (
                alert_id, product_id, alert_type, previous_price, current_price,
                price_change_percent, timestamp, expires_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &alert.alert_id,
                &alert.product_id,
                alert.alert_type.as_str(),
                alert.previous_price,
                alert.current_price,
                alert.price_change_percent,
                alert.timestamp.to_rfc3339(),
                alert.expires_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlertType;
    use chrono::Duration;

    fn product(id: &str, active: bool) -> Product {
        Product {
            id: id.to_string(),
            url: format!("https://shop.example.com/{id}"),
            display_name: format!("Product {id}"),
            active,
            last_price: None,
            last_updated: None,
        }
    }

    fn record(product_id: &str, at: DateTime<Utc>, price: f64) -> HistoryRecord {
        HistoryRecord {
            product_id: product_id.to_string(),
            timestamp: at,
            price,
            price_change: None,
            price_change_percent: None,
            expires_at: Some(at + Duration::days(365)),
        }
    }

    #[test]
    fn product_roundtrip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.put_product(&product("p1", true)).unwrap();

        let loaded = storage.get_product("p1").unwrap().expect("stored product");
        assert_eq!(loaded.id, "p1");
        assert_eq!(loaded.display_name, "Product p1");
        assert!(loaded.active);
        assert_eq!(loaded.last_price, None);
        assert_eq!(storage.get_product("missing").unwrap().map(|p| p.id), None);
    }

    #[test]
    fn listing_skips_inactive_products() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.put_product(&product("active-1", true)).unwrap();
        storage.put_product(&product("retired", false)).unwrap();
        storage.put_product(&product("active-2", true)).unwrap();

        let ids: Vec<String> = storage
            .list_active_products()
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["active-1", "active-2"]);
    }

    #[test]
    fn price_update_writes_back() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.put_product(&product("p1", true)).unwrap();

        let now = Utc::now();
        storage.update_product_price("p1", 19.99, now).unwrap();

        let loaded = storage.get_product("p1").unwrap().unwrap();
        assert_eq!(loaded.last_price, Some(19.99));
        assert_eq!(loaded.last_updated, Some(now.to_rfc3339().parse().unwrap()));
    }

    #[test]
    fn updating_an_unknown_product_fails() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let err = storage
            .update_product_price("ghost", 1.0, Utc::now())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn history_comes_back_in_insertion_order() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let base = Utc::now();
        for (i, price) in [100.0, 94.0, 97.0].iter().enumerate() {
            storage
                .append_history(&record("p1", base + Duration::seconds(i as i64), *price))
                .unwrap();
        }

        let prices: Vec<f64> = storage
            .query_history("p1", 10)
            .unwrap()
            .iter()
            .map(|r| r.price)
            .collect();
        assert_eq!(prices, vec![100.0, 94.0, 97.0]);
    }

    #[test]
    fn window_keeps_the_most_recent_records() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let base = Utc::now();
        for i in 0..5 {
            storage
                .append_history(&record("p1", base + Duration::seconds(i), 100.0 + i as f64))
                .unwrap();
        }

        let prices: Vec<f64> = storage
            .query_history("p1", 2)
            .unwrap()
            .iter()
            .map(|r| r.price)
            .collect();
        assert_eq!(prices, vec![103.0, 104.0]);
    }

    #[test]
    fn history_is_scoped_per_product() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        storage.append_history(&record("p1", now, 10.0)).unwrap();
        storage.append_history(&record("p2", now, 20.0)).unwrap();

        let records = storage.query_history("p1", 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 10.0);
    }

    #[test]
    fn alerts_are_append_only_and_unique() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let now = Utc::now();
        let alert = Alert {
            alert_id: "p1_1700000000".to_string(),
            product_id: "p1".to_string(),
            alert_type: AlertType::PriceDrop,
            previous_price: 100.0,
            current_price: 94.0,
            price_change_percent: -0.06,
            timestamp: now,
            expires_at: Some(now + Duration::days(90)),
        };
        storage.append_alert(&alert).unwrap();
        // Same alert_id again violates uniqueness.
        assert!(storage.append_alert(&alert).is_err());
    }
}
