use crate::model::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

pub const DEFAULT_ALERT_THRESHOLD: f64 = 0.05;
pub const DEFAULT_SCRAPE_DELAY_SECONDS: f64 = 2.0;
pub const DEFAULT_ANALYTICS_WINDOW: usize = 30;

/// Identifying headers rotated across fetch attempts when the config source
/// does not provide its own pool.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (compatible; PriceTracker/1.0)",
];

/// Remote configuration/parameter source. Read once per invocation; every
/// recognized key has an explicit default.
pub trait ConfigSource {
    fn get(&self, key: &str) -> Option<Value>;
}

/// Flat JSON file of key/value pairs, e.g. `{"alert.threshold": 0.05}`.
/// A missing file is an empty source; defaults apply.
pub struct FileConfigSource {
    values: HashMap<String, Value>,
}

impl FileConfigSource {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self { values: HashMap::new() });
            }
            Err(e) => {
                return Err(ConfigError::Unreadable {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        let values = serde_json::from_str(&content).map_err(|e| ConfigError::Unreadable {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { values })
    }
}

impl ConfigSource for FileConfigSource {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }
}

/// Configuration snapshot for one batch run, resolved up front so no
/// per-product remote lookups happen later.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub alert_threshold: f64,
    pub scrape_delay: Duration,
    pub user_agent_pool: Vec<String>,
    pub analytics_window: usize,
}

impl RunConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let alert_threshold = read_f64(source, "alert.threshold", DEFAULT_ALERT_THRESHOLD)?;
        let delay_seconds = read_f64(source, "scrape.delay_seconds", DEFAULT_SCRAPE_DELAY_SECONDS)?;
        let user_agent_pool = read_user_agents(source)?;
        let analytics_window = read_usize(source, "analytics.window_size", DEFAULT_ANALYTICS_WINDOW)?;

        Ok(Self {
            alert_threshold,
            scrape_delay: Duration::from_secs_f64(delay_seconds),
            user_agent_pool,
            analytics_window,
        })
    }
}

/// Accepts JSON numbers and numeric strings; parameter stores often hold
/// everything as text.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_f64(source: &dyn ConfigSource, key: &str, default: f64) -> Result<f64, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => numeric(&value)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected a non-negative number, got {value}"),
            }),
    }
}

fn read_usize(source: &dyn ConfigSource, key: &str, default: usize) -> Result<usize, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => numeric(&value)
            .filter(|v| v.is_finite() && *v >= 1.0)
            .map(|v| v as usize)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("expected a positive integer, got {value}"),
            }),
    }
}

fn read_user_agents(source: &dyn ConfigSource) -> Result<Vec<String>, ConfigError> {
    const KEY: &str = "scrape.user_agent_pool";
    match source.get(KEY) {
        None => Ok(DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()),
        Some(Value::Array(items)) => {
            let pool: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect();
            if pool.is_empty() || pool.len() != items.len() {
                return Err(ConfigError::InvalidValue {
                    key: KEY.to_string(),
                    reason: "expected a non-empty list of strings".to_string(),
                });
            }
            Ok(pool)
        }
        Some(other) => Err(ConfigError::InvalidValue {
            key: KEY.to_string(),
            reason: format!("expected a list of strings, got {other}"),
        }),
    }
}

/// Wiring helpers for keys whose absence is not an error.
pub fn read_string(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source.get(key).and_then(|v| v.as_str().map(str::to_string))
}

pub fn read_i64(source: &dyn ConfigSource, key: &str) -> Option<i64> {
    source.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

pub fn read_seconds(source: &dyn ConfigSource, key: &str) -> Option<Duration> {
    source
        .get(key)
        .and_then(|v| numeric(&v))
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(Duration::from_secs_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MapSource(HashMap<String, Value>);

    impl ConfigSource for MapSource {
        fn get(&self, key: &str) -> Option<Value> {
            self.0.get(key).cloned()
        }
    }

    fn source(pairs: &[(&str, Value)]) -> MapSource {
        MapSource(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn defaults_apply_when_keys_are_absent() {
        let config = RunConfig::from_source(&source(&[])).unwrap();
        assert_eq!(config.alert_threshold, DEFAULT_ALERT_THRESHOLD);
        assert_eq!(config.scrape_delay, Duration::from_secs(2));
        assert_eq!(config.analytics_window, DEFAULT_ANALYTICS_WINDOW);
        assert!(!config.user_agent_pool.is_empty());
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let config = RunConfig::from_source(&source(&[
            ("alert.threshold", json!("0.10")),
            ("scrape.delay_seconds", json!("0.5")),
        ]))
        .unwrap();
        assert_eq!(config.alert_threshold, 0.10);
        assert_eq!(config.scrape_delay, Duration::from_millis(500));
    }

    #[test]
    fn invalid_threshold_is_fatal() {
        let err = RunConfig::from_source(&source(&[("alert.threshold", json!("five percent"))]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn empty_user_agent_pool_is_fatal() {
        let err = RunConfig::from_source(&source(&[("scrape.user_agent_pool", json!([]))]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn configured_user_agent_pool_wins() {
        let config = RunConfig::from_source(&source(&[(
            "scrape.user_agent_pool",
            json!(["agent-a", "agent-b"]),
        )]))
        .unwrap();
        assert_eq!(config.user_agent_pool, vec!["agent-a", "agent-b"]);
    }

    #[test]
    fn wiring_helpers_read_optional_keys() {
        let src = source(&[
            ("storage.path", json!("data.db")),
            ("notify.telegram_chat_id", json!(42)),
            ("run.time_budget_seconds", json!(120)),
        ]);
        assert_eq!(read_string(&src, "storage.path").as_deref(), Some("data.db"));
        assert_eq!(read_i64(&src, "notify.telegram_chat_id"), Some(42));
        assert_eq!(
            read_seconds(&src, "run.time_budget_seconds"),
            Some(Duration::from_secs(120))
        );
        assert_eq!(read_string(&src, "notify.telegram_bot_token"), None);
    }
}
