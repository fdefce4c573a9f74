//! Menel Store - cached bot configuration over MongoDB.
//!
//! Gives the command layer near-zero-latency reads of small configuration
//! documents (guild prefixes, the global blacklist) while MongoDB stays the
//! source of truth.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Store adapters (MongoDB, in-memory) and the `ConfigStore` facade
//! - `cache` - Write-through document caches built on Moka
//! - `error` - Error type shared by every layer
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let db = Database::connect(&config).await?;
//! let store = ConfigStore::from_database(&db, &config);
//!
//! if store.is_blacklisted(author_id).await? {
//!     return Ok(());
//! }
//! let prefixes = store.command_prefixes(guild_id, bot_user_id).await?;
//! ```

pub mod cache;
pub mod config;
pub mod database;
pub mod error;

pub use cache::{CacheConfig, DocumentCache, Field};
pub use config::Config;
pub use database::{ConfigStore, Database, DocumentId, DocumentStore, MemoryStore, Update};
pub use error::{Error, Result};
