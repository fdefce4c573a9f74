//! Cache module - Document caching with Moka.
//!
//! Each logical collection gets one [`DocumentCache`]: a lazily populated,
//! write-through mirror of its documents. Fields are declared up front as
//! typed [`Field`]s carrying their defaults.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let prefixes = Field::new("prefixes", vec!["?".to_string()]);
//! let cache = DocumentCache::new("guild_config", collection, CacheConfig::default());
//!
//! cache.set(&DocumentId::Entity(guild_id), &prefixes, vec!["!".into()]).await?;
//! let current = cache.get(Some(&DocumentId::Entity(guild_id)), &prefixes).await?;
//! ```

mod config;
mod document;
mod field;

pub use config::CacheConfig;
pub use document::DocumentCache;
pub use field::Field;
