use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::LeaseSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct InvoicingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub mongodb: MongoConfig,
    pub lease: LeaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown STORE_BACKEND '{}'; expected mongo or memory",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Per-attempt timeout of one store call.
    pub timeout_ms: u64,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeaseConfig {
    pub ttl_secs: u64,
    pub wait_ms: u64,
}

impl InvoicingConfig {
    pub fn load() -> Result<Self, AppError> {
        let mut common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        if let Ok(level) = env::var("LOG_LEVEL") {
            common_config.log_level = level;
        }
        if let Ok(endpoint) = env::var("OTLP_ENDPOINT") {
            common_config.otlp_endpoint = Some(endpoint);
        }

        let backend: StoreBackend = get_env("STORE_BACKEND", Some("mongo"), is_prod)?.parse()?;
        // The in-memory backend needs no database settings, even in prod.
        let needs_mongo = is_prod && backend == StoreBackend::Mongo;

        Ok(InvoicingConfig {
            common: common_config,
            store: StoreConfig {
                backend,
                timeout_ms: parse_env("STORE_TIMEOUT_MS", 5000)?,
                max_retries: parse_env("STORE_MAX_RETRIES", 3)?,
            },
            mongodb: MongoConfig {
                uri: get_env(
                    "MONGODB_URI",
                    Some("mongodb://localhost:27017"),
                    needs_mongo,
                )?,
                database: get_env("MONGODB_DATABASE", Some("invoicing_db"), needs_mongo)?,
            },
            lease: LeaseConfig {
                ttl_secs: parse_env("LEASE_TTL_SECS", 30)?,
                wait_ms: parse_env("LEASE_WAIT_MS", 5000)?,
            },
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.store.max_retries,
            attempt_timeout: Duration::from_millis(self.store.timeout_ms),
            ..RetryConfig::default()
        }
    }

    pub fn lease_settings(&self) -> LeaseSettings {
        LeaseSettings {
            ttl: Duration::from_secs(self.lease.ttl_secs),
            wait: Duration::from_millis(self.lease.wait_ms),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Numeric setting with a default. A value that is set but unparsable is an
/// error rather than silently replaced.
fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}'", key, raw))
        }),
        Err(_) => Ok(default),
    }
}
