//! Configuration module for the configuration store.
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::cache::CacheConfig;

/// Prefix used when a guild has not configured its own.
pub const DEFAULT_PREFIX: &str = "?";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    /// Application name reported to the MongoDB server.
    pub app_name: String,

    /// Fallback command prefix for guilds without stored prefixes.
    pub default_prefix: String,

    /// Eviction policy shared by the document caches.
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns error if `MONGODB_URI` (or `DB_HOST`) is missing or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Build configuration from a variable lookup.
    fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongodb_uri = var("MONGODB_URI")
            .or_else(|| var("DB_HOST"))
            .context("MONGODB_URI (or DB_HOST) must be set")?;

        let default_prefix = var("DEFAULT_PREFIX")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());

        let mut cache = CacheConfig::default();

        if let Some(capacity) = parse_var::<u64>("CACHE_MAX_CAPACITY", var("CACHE_MAX_CAPACITY"))? {
            if capacity == 0 {
                bail!("CACHE_MAX_CAPACITY must be greater than zero");
            }
            cache = cache.max_capacity(capacity);
        }

        if let Some(secs) = parse_var::<u64>("CACHE_TTL_SECS", var("CACHE_TTL_SECS"))? {
            cache = cache.ttl(Duration::from_secs(secs));
        }

        Ok(Self {
            mongodb_uri,
            mongodb_database: var("MONGODB_DATABASE").unwrap_or_else(|| "bot".to_string()),
            app_name: var("APP_NAME").unwrap_or_else(|| "menel".to_string()),
            default_prefix,
            cache,
        })
    }

    /// Configuration pointing at `uri` with every other setting at its default.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            mongodb_uri: uri.into(),
            mongodb_database: "bot".to_string(),
            app_name: "menel".to_string(),
            default_prefix: DEFAULT_PREFIX.to_string(),
            cache: CacheConfig::default(),
        }
    }
}

/// Parse an optional numeric variable; blank counts as unset.
fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        _ => Ok(None),
    }
}
