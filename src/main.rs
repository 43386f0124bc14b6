mod alerts;
mod analyzer;
mod config;
mod detector;
mod fetcher;
mod model;
mod notifier;
mod orchestrator;
mod parser;
mod router;
mod storage;

use chrono::Utc;
use config::{ConfigSource, FileConfigSource, RunConfig};
use fetcher::{PriceFetcher, RetryPolicy};
use model::Product;
use notifier::{LogNotifier, Notifier, TelegramNotifier};
use orchestrator::Orchestrator;
use router::{ApiRequest, RequestRouter};
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use storage::{SharedStorage, SqliteStorage, Storage};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path =
        std::env::var("PRICEWATCH_CONFIG").unwrap_or_else(|_| "config.json".to_string());

    // Snapshot the configuration once; a broken config aborts the invocation
    // before any product is touched.
    let source = match FileConfigSource::load(&config_path) {
        Ok(source) => source,
        Err(e) => {
            error!("config load error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let run_config = match RunConfig::from_source(&source) {
        Ok(run_config) => run_config,
        Err(e) => {
            error!("config error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let db_path = config::read_string(&source, "storage.path")
        .unwrap_or_else(|| "pricewatch.db".to_string());
    let storage = match SqliteStorage::new(&db_path) {
        Ok(s) => storage::shared(s),
        Err(e) => {
            error!("failed to open storage at {db_path}: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    match args.first().map(String::as_str) {
        None | Some("track") => run_track(&source, &run_config, storage).await,
        Some("api") => run_api(&args, storage, &run_config).await,
        Some("add") => run_add(&args, storage).await,
        Some(other) => {
            error!("unknown mode '{other}' (expected: track, api, add)");
            ExitCode::FAILURE
        }
    }
}

/// One batch run across all active products, as triggered by a scheduler tick.
async fn run_track(
    source: &dyn ConfigSource,
    run_config: &RunConfig,
    storage: SharedStorage,
) -> ExitCode {
    let fetcher = match PriceFetcher::new(
        run_config.user_agent_pool.clone(),
        run_config.scrape_delay,
        RetryPolicy::default(),
    ) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("failed to build fetcher: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut orchestrator = Orchestrator::new(storage, build_notifier(source), fetcher, run_config);
    if let Some(budget) = config::read_seconds(source, "run.time_budget_seconds") {
        orchestrator = orchestrator.with_time_budget(budget);
    }

    let summary = orchestrator.run_batch().await;
    let body = serde_json::json!({
        "message": "price tracking completed",
        "succeeded": summary.succeeded,
        "failed": summary.failed,
        "alerts_sent": summary.alerts_sent,
        "timestamp": Utc::now().to_rfc3339(),
    });
    println!("{body}");
    ExitCode::SUCCESS
}

fn build_notifier(source: &dyn ConfigSource) -> Arc<dyn Notifier> {
    let token = config::read_string(source, "notify.telegram_bot_token");
    let chat_id = config::read_i64(source, "notify.telegram_chat_id");
    match (token, chat_id) {
        (Some(token), Some(chat_id)) => match TelegramNotifier::new(token, chat_id) {
            Ok(notifier) => Arc::new(notifier),
            Err(e) => {
                warn!("telegram notifier unavailable, logging alerts instead: {e}");
                Arc::new(LogNotifier)
            }
        },
        _ => Arc::new(LogNotifier),
    }
}

/// Routes one read-style request and prints the response.
async fn run_api(args: &[String], storage: SharedStorage, run_config: &RunConfig) -> ExitCode {
    let (Some(method), Some(target)) = (args.get(1), args.get(2)) else {
        error!("usage: pricewatch api <METHOD> <PATH[?QUERY]>");
        return ExitCode::FAILURE;
    };

    let (path, query) = split_query(target);
    let request = ApiRequest {
        method: method.to_uppercase(),
        path,
        query,
    };

    let router = RequestRouter::new(storage, run_config.analytics_window);
    let response = router.handle(&request).await;
    println!("{} {}", response.status_code, response.body);
    ExitCode::SUCCESS
}

/// Registers a product for tracking (the external management action).
async fn run_add(args: &[String], storage: SharedStorage) -> ExitCode {
    let (Some(id), Some(name), Some(url)) = (args.get(1), args.get(2), args.get(3)) else {
        error!("usage: pricewatch add <id> <name> <url>");
        return ExitCode::FAILURE;
    };

    let product = Product {
        id: id.clone(),
        url: url.clone(),
        display_name: name.clone(),
        active: true,
        last_price: None,
        last_updated: None,
    };
    if let Err(e) = storage.lock().await.put_product(&product) {
        error!(product_id = %product.id, "failed to register product: {e}");
        return ExitCode::FAILURE;
    }
    info!(product_id = %product.id, url = %product.url, "product registered");
    ExitCode::SUCCESS
}

fn split_query(target: &str) -> (String, HashMap<String, String>) {
    let Some((path, raw_query)) = target.split_once('?') else {
        return (target.to_string(), HashMap::new());
    };
    let query = raw_query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (path.to_string(), query)
}
