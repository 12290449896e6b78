//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::product_sync::SyncSettings;
use crate::types::ResourceKey;

/// Where job records live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStoreBackend {
    Postgres,
    /// Process-local, lost on exit
    Memory,
}

impl FromStr for JobStoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(JobStoreBackend::Postgres),
            "memory" => Ok(JobStoreBackend::Memory),
            other => Err(format!("unknown job store '{}' (expected postgres or memory)", other)),
        }
    }
}

/// Which platform products are migrated into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBackend {
    Shopify,
    /// Deterministic in-memory target, nothing leaves the process
    Mock,
}

impl FromStr for TargetBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopify" => Ok(TargetBackend::Shopify),
            "mock" => Ok(TargetBackend::Mock),
            other => Err(format!("unknown target backend '{}' (expected shopify or mock)", other)),
        }
    }
}

/// Target platform connection
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub backend: TargetBackend,
    /// Shop domain, e.g. `my-store.myshopify.com`
    pub shop: String,
    pub access_token: String,
    pub api_version: String,
    pub request_timeout: Duration,
    /// Retries on throttling before giving up
    pub max_retries: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            backend: TargetBackend::Shopify,
            shop: String::new(),
            access_token: String::new(),
            api_version: "2025-07".to_string(),
            request_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

/// Worker pool and claim settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lock owner identity
    pub worker_id: String,
    /// Concurrent slots in this process
    pub max_jobs: usize,
    pub lock_ttl: Duration,
    pub poll_interval: Duration,
    /// Only claim jobs for this resource
    pub resource_filter: Option<ResourceKey>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string (required for the postgres job store)
    pub database_url: Option<String>,

    pub job_store: JobStoreBackend,

    pub target: TargetConfig,

    pub worker: WorkerConfig,

    /// Pause after each migrated product
    pub product_delay: Duration,

    /// Pause after each created metafield definition
    pub metafield_definition_delay: Duration,

    pub uploads_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL");
        let job_store = parse_or(&var, "JOB_STORE", JobStoreBackend::Postgres)?;

        let defaults = TargetConfig::default();
        let target = TargetConfig {
            backend: parse_or(&var, "TARGET_BACKEND", TargetBackend::Shopify)?,
            shop: var("TARGET_SHOP").unwrap_or_default(),
            access_token: var("TARGET_ACCESS_TOKEN").unwrap_or_default(),
            api_version: var("TARGET_API_VERSION").unwrap_or(defaults.api_version),
            request_timeout: Duration::from_secs(parse_or(&var, "TARGET_TIMEOUT_SECS", 60u64)?),
            max_retries: parse_or(&var, "TARGET_MAX_RETRIES", defaults.max_retries)?,
        };

        let worker_id = match var("WORKER_ID") {
            Some(id) => id,
            None => format!(
                "{}-{}",
                var("HOSTNAME").unwrap_or_else(|| "worker".to_string()),
                std::process::id()
            ),
        };
        let max_jobs: usize = parse_or(&var, "MAX_JOBS_PER_PROCESS", 3)?;
        if max_jobs == 0 {
            anyhow::bail!("MAX_JOBS_PER_PROCESS must be at least 1");
        }
        let resource_filter = match var("WORKER_RESOURCE_KEY") {
            Some(raw) => Some(
                raw.parse::<ResourceKey>()
                    .map_err(anyhow::Error::msg)
                    .context("Invalid WORKER_RESOURCE_KEY")?,
            ),
            None => None,
        };
        let worker = WorkerConfig {
            worker_id,
            max_jobs,
            lock_ttl: Duration::from_secs(parse_or(&var, "JOB_LOCK_TTL_MINUTES", 60u64)? * 60),
            poll_interval: Duration::from_millis(parse_or(&var, "JOB_POLL_INTERVAL_MS", 1500u64)?),
            resource_filter,
        };

        Ok(Self {
            database_url,
            job_store,
            target,
            worker,
            product_delay: Duration::from_millis(parse_or(&var, "PRODUCT_DELAY_MS", 1000u64)?),
            metafield_definition_delay: Duration::from_millis(parse_or(
                &var,
                "METAFIELD_DEFINITION_DELAY_MS",
                250u64,
            )?),
            uploads_dir: PathBuf::from(var("UPLOADS_DIR").unwrap_or_else(|| "uploads".to_string())),
            reports_dir: PathBuf::from(var("REPORTS_DIR").unwrap_or_else(|| "reports".to_string())),
            logs_dir: PathBuf::from(var("LOGS_DIR").unwrap_or_else(|| "logs".to_string())),
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set for the postgres job store")
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            product_delay: self.product_delay,
            metafield_definition_delay: self.metafield_definition_delay,
        }
    }
}

/// Parse `key` if set, otherwise use `default`. Garbage is an error, not a default.
fn parse_or<T, V>(var: &V, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
