//! Database module exports.

mod config_store;
mod id;
mod memory;
mod mongo;
pub mod prefixes;
mod store;

pub use config_store::{
    BOT_CONFIG_COLLECTION, ConfigStore, GUILD_CONFIG_COLLECTION, NAME_HISTORY_COLLECTION,
    NAME_HISTORY_PAGE_SIZE, NameHistoryPage,
};
pub use id::DocumentId;
pub use memory::MemoryStore;
pub use mongo::Database;
pub use store::{DocumentStore, Update};
