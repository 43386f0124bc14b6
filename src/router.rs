use crate::analyzer;
use crate::storage::{SharedStorage, Storage};
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

/// Inbound read-style request, decoupled from any transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
}

/// Status code plus serialized JSON body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub body: String,
}

impl ApiResponse {
    fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    fn not_found(message: &str) -> Self {
        Self {
            status_code: 404,
            body: json!({ "error": message }).to_string(),
        }
    }

    fn server_error(message: &str) -> Self {
        Self {
            status_code: 500,
            body: json!({ "error": message }).to_string(),
        }
    }
}

/// Read-only entry point: answers product listings and analytics, never
/// mutates products, history or alerts.
pub struct RequestRouter {
    storage: SharedStorage,
    analytics_window: usize,
}

impl RequestRouter {
    pub fn new(storage: SharedStorage, analytics_window: usize) -> Self {
        Self {
            storage,
            analytics_window,
        }
    }

    pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/products") => self.list_products().await,
            ("GET", "/analytics") => self.product_analytics(&request.query).await,
            _ => ApiResponse::not_found("no such route"),
        }
    }

    async fn list_products(&self) -> ApiResponse {
        let products = match self.storage.lock().await.list_active_products() {
            Ok(products) => products,
            Err(e) => {
                warn!("product listing failed: {e}");
                return ApiResponse::server_error("storage unavailable");
            }
        };
        match serde_json::to_string(&products) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiResponse::server_error(&e.to_string()),
        }
    }

    async fn product_analytics(&self, query: &HashMap<String, String>) -> ApiResponse {
        let Some(product_id) = query.get("product_id") else {
            return ApiResponse::not_found("missing product_id parameter");
        };
        let window = query
            .get("window")
            .and_then(|w| w.parse::<usize>().ok())
            .filter(|w| *w > 0)
            .unwrap_or(self.analytics_window);

        let (product, history) = {
            let storage = self.storage.lock().await;
            let product = match storage.get_product(product_id) {
                Ok(Some(product)) => product,
                Ok(None) => return ApiResponse::not_found("unknown product_id"),
                Err(e) => {
                    warn!(product_id = %product_id, "product lookup failed: {e}");
                    return ApiResponse::server_error("storage unavailable");
                }
            };
            let history = match storage.query_history(product_id, window) {
                Ok(history) => history,
                Err(e) => {
                    warn!(product_id = %product_id, "history query failed: {e}");
                    return ApiResponse::server_error("storage unavailable");
                }
            };
            (product, history)
        };

        let result = analyzer::analyze(&product.display_name, &history, window);
        match serde_json::to_string(&result) {
            Ok(body) => ApiResponse::ok(body),
            Err(e) => ApiResponse::server_error(&e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HistoryRecord, Product};
    use crate::storage::{SharedStorage, SqliteStorage, Storage, shared};
    use chrono::{Duration, Utc};
    use serde_json::Value;

    fn seeded_storage() -> SharedStorage {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .put_product(&Product {
                id: "widget".to_string(),
                url: "https://shop.example.com/widget".to_string(),
                display_name: "Widget".to_string(),
                active: true,
                last_price: Some(95.0),
                last_updated: Some(Utc::now()),
            })
            .unwrap();
        storage
            .put_product(&Product {
                id: "retired".to_string(),
                url: "https://shop.example.com/retired".to_string(),
                display_name: "Retired".to_string(),
                active: false,
                last_price: None,
                last_updated: None,
            })
            .unwrap();

        let base = Utc::now() - Duration::days(4);
        let prices = [100.0, 90.0, 120.0, 95.0];
        for (i, price) in prices.iter().enumerate() {
            let previous = if i == 0 { None } else { Some(prices[i - 1]) };
            storage
                .append_history(&HistoryRecord {
                    product_id: "widget".to_string(),
                    timestamp: base + Duration::days(i as i64),
                    price: *price,
                    price_change: previous.map(|prev| price - prev),
                    price_change_percent: previous.map(|prev| (price - prev) / prev),
                    expires_at: None,
                })
                .unwrap();
        }
        shared(storage)
    }

    fn get(path: &str, query: &[(&str, &str)]) -> ApiRequest {
        ApiRequest {
            method: "GET".to_string(),
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn products_route_lists_active_products() {
        let router = RequestRouter::new(seeded_storage(), 30);
        let response = router.handle(&get("/products", &[])).await;

        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        let products = body.as_array().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0]["product_id"], "widget");
        assert_eq!(products[0]["product_name"], "Widget");
        assert_eq!(products[0]["last_price"], 95.0);
    }

    #[tokio::test]
    async fn analytics_route_returns_the_derived_payload() {
        let router = RequestRouter::new(seeded_storage(), 30);
        let response = router
            .handle(&get("/analytics", &[("product_id", "widget")]))
            .await;

        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["product_name"], "Widget");
        assert_eq!(body["current_price"], 95.0);
        assert_eq!(body["historical_low"], 90.0);
        assert_eq!(body["potential_savings"], 5.0);
        assert_eq!(body["trend"], "DECREASING");
        assert_eq!(body["recommendation"], "HOLD");
    }

    #[tokio::test]
    async fn analytics_honors_the_window_parameter() {
        let router = RequestRouter::new(seeded_storage(), 30);
        let response = router
            .handle(&get(
                "/analytics",
                &[("product_id", "widget"), ("window", "2")],
            ))
            .await;

        let body: Value = serde_json::from_str(&response.body).unwrap();
        // The low of 90 sits outside a 2-record window.
        assert_eq!(body["historical_low"], 95.0);
    }

    #[tokio::test]
    async fn missing_product_id_is_not_found() {
        let router = RequestRouter::new(seeded_storage(), 30);
        let response = router.handle(&get("/analytics", &[])).await;

        assert_eq!(response.status_code, 404);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_product_id_is_not_found() {
        let router = RequestRouter::new(seeded_storage(), 30);
        let response = router
            .handle(&get("/analytics", &[("product_id", "ghost")]))
            .await;
        assert_eq!(response.status_code, 404);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let router = RequestRouter::new(seeded_storage(), 30);
        assert_eq!(router.handle(&get("/nope", &[])).await.status_code, 404);

        let post = ApiRequest {
            method: "POST".to_string(),
            path: "/products".to_string(),
            query: HashMap::new(),
        };
        assert_eq!(router.handle(&post).await.status_code, 404);
    }

    #[tokio::test]
    async fn analytics_for_a_product_without_history_uses_defaults() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .put_product(&Product {
                id: "fresh".to_string(),
                url: "https://shop.example.com/fresh".to_string(),
                display_name: "Fresh".to_string(),
                active: true,
                last_price: None,
                last_updated: None,
            })
            .unwrap();
        let router = RequestRouter::new(shared(storage), 30);

        let response = router
            .handle(&get("/analytics", &[("product_id", "fresh")]))
            .await;
        assert_eq!(response.status_code, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["current_price"], 0.0);
        assert_eq!(body["trend"], "STABLE");
        assert_eq!(body["volatility"], "LOW");
    }
}
