use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs;
use tokio::time::Duration;

pub const DEFAULT_TABLE_NAME: &str = "website-status-checks";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Dynamodb,
    Memory,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServiceConfig {
    #[serde(default = "default_table_name")]
    pub table_name: String,
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Connect to the addresses approved at validation instead of re-resolving.
    #[serde(default = "default_true")]
    pub pin_resolved_addresses: bool,
    /// Hold redirect hops to the literal host rules.
    #[serde(default = "default_true")]
    pub guard_redirects: bool,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Dynamodb
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_true() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            store_backend: default_store_backend(),
            store_timeout_ms: default_store_timeout_ms(),
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            pin_resolved_addresses: true,
            guard_redirects: true,
        }
    }
}

impl ServiceConfig {
    /// File named by `CHECKER_CONFIG` if set, then environment overrides.
    pub async fn load() -> Result<Self> {
        let mut config = match std::env::var("CHECKER_CONFIG") {
            Ok(path) => {
                println!("Loading config file: {}", path);
                Self::load_file_config(&path).await?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate_log_level()?;
        Ok(config)
    }

    async fn load_file_config(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: ServiceConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(table) = lookup("DYNAMODB_TABLE").filter(|t| !t.is_empty()) {
            self.table_name = table;
        }
        if let Some(backend) = lookup("STORE_BACKEND") {
            self.store_backend = serde_json::from_value(serde_json::Value::String(backend.to_lowercase()))
                .map_err(|_| anyhow::anyhow!("Invalid STORE_BACKEND: {}. Valid values are: dynamodb, memory", backend))?;
        }
        if let Some(addr) = lookup("LISTEN_ADDR") {
            self.listen_addr = addr.parse()?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.log_format = serde_json::from_value(serde_json::Value::String(format.to_lowercase()))
                .map_err(|_| anyhow::anyhow!("Invalid LOG_FORMAT: {}. Valid values are: text, json", format))?;
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn validate_log_level(&self) -> Result<()> {
        self.get_tracing_level().map(|_| ())
    }
}
