//! Server configuration loaded from environment variables.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use replication::StockWriteMode;

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    /// The order server was given an empty replica list.
    #[error("CATALOG_REPLICAS must list at least one catalog replica")]
    NoReplicas,
}

/// Settings shared by both servers.
///
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: 3001 for catalog, 3000 for order)
/// - `SERVICE_ID` instance tag (default: `<service>-<8 hex chars>`)
/// - `CALL_TIMEOUT_MS` per-call timeout (default: 2000)
/// - `FANOUT_CONCURRENCY` peer syncs in flight (default: 8)
/// - `FRONTEND_URL` cache sink base URL (default: `http://localhost:3002`)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub service_id: String,
    pub call_timeout: Duration,
    pub fanout_concurrency: usize,
    pub frontend_url: String,
}

impl ServerConfig {
    fn from_lookup(
        lookup: &impl Fn(&str) -> Option<String>,
        service: &str,
        default_port: u16,
    ) -> Result<Self, ConfigError> {
        let call_timeout_ms: u64 = parse(lookup, "CALL_TIMEOUT_MS", 2000)?;
        if call_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "CALL_TIMEOUT_MS",
                reason: "must be greater than zero".to_string(),
            });
        }
        let fanout_concurrency: usize = parse(lookup, "FANOUT_CONCURRENCY", 8)?;
        if fanout_concurrency == 0 {
            return Err(ConfigError::Invalid {
                var: "FANOUT_CONCURRENCY",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            host: var(lookup, "HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(lookup, "PORT", default_port)?,
            service_id: var(lookup, "SERVICE_ID").unwrap_or_else(|| default_service_id(service)),
            call_timeout: Duration::from_millis(call_timeout_ms),
            fanout_concurrency,
            frontend_url: var(lookup, "FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3002".to_string()),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Catalog server configuration.
///
/// Adds `CATALOG_PEERS` (comma-separated peer URLs, default none) and
/// `CATALOG_PATH` (default `catalog.json`).
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub server: ServerConfig,
    pub peers: Vec<String>,
    pub catalog_path: PathBuf,
}

impl CatalogConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_lookup(&lookup, "catalog", 3001)?,
            peers: var(&lookup, "CATALOG_PEERS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            catalog_path: var(&lookup, "CATALOG_PATH")
                .unwrap_or_else(|| "catalog.json".to_string())
                .into(),
        })
    }
}

/// Order server configuration.
///
/// Adds `CATALOG_REPLICAS` (comma-separated, default `http://localhost:3001`),
/// `STOCK_WRITE_MODE` (`blind` or `compare-and-set`, default `blind`) and
/// `ORDERS_PATH` (default `orders.jsonl`).
#[derive(Debug, Clone)]
pub struct OrderConfig {
    pub server: ServerConfig,
    pub replicas: Vec<String>,
    pub write_mode: StockWriteMode,
    pub orders_path: PathBuf,
}

impl OrderConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let replicas = match lookup("CATALOG_REPLICAS") {
            Some(raw) => split_list(&raw),
            None => vec!["http://localhost:3001".to_string()],
        };
        if replicas.is_empty() {
            return Err(ConfigError::NoReplicas);
        }

        Ok(Self {
            server: ServerConfig::from_lookup(&lookup, "order", 3000)?,
            replicas,
            write_mode: parse(&lookup, "STOCK_WRITE_MODE", StockWriteMode::Blind)?,
            orders_path: var(&lookup, "ORDERS_PATH")
                .unwrap_or_else(|| "orders.jsonl".to_string())
                .into(),
        })
    }
}

fn var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match var(lookup, name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn default_service_id(service: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{service}-{}", &suffix[..8])
}
