//! Bot configuration facade.
//!
//! Named operations over the document caches: guild prefixes, the global
//! blacklist and per-user name history. This is the only type the command
//! layer talks to.

use std::collections::HashSet;

use mongodb::Collection;
use mongodb::bson::Document;
use tracing::debug;

use super::prefixes::{mention_prefixes, normalize_prefixes};
use super::{Database, DocumentId, DocumentStore, Update};
use crate::cache::{CacheConfig, DocumentCache, Field};
use crate::config::Config;
use crate::error::Result;

/// Collection holding bot-wide documents such as the blacklist.
pub const BOT_CONFIG_COLLECTION: &str = "bot_config";

/// Collection holding one document per guild.
pub const GUILD_CONFIG_COLLECTION: &str = "guild_config";

/// Collection holding one document per user with their past names.
pub const NAME_HISTORY_COLLECTION: &str = "name_history";

/// Names shown per page of a user's name history.
pub const NAME_HISTORY_PAGE_SIZE: usize = 16;

const BLACKLIST_ID: DocumentId = DocumentId::Key("blacklist");

const NAMES: Field<Vec<String>> = Field::new("names", Vec::new());

/// One page of a user's name history, newest name first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameHistoryPage {
    pub names: Vec<String>,
    /// 1-based page number.
    pub page: usize,
    pub pages: usize,
}

/// Typed access to the bot's stored configuration.
pub struct ConfigStore<S> {
    bot_config: DocumentCache<S>,
    guild_config: DocumentCache<S>,
    name_history: S,
    prefixes: Field<Vec<String>>,
    blacklist: Field<Vec<u64>>,
}

impl ConfigStore<Collection<Document>> {
    /// Build the store over the bot's MongoDB collections.
    pub fn from_database(db: &Database, config: &Config) -> Self {
        Self::new(
            db.collection(BOT_CONFIG_COLLECTION),
            db.collection(GUILD_CONFIG_COLLECTION),
            db.collection(NAME_HISTORY_COLLECTION),
            &config.default_prefix,
            config.cache.clone(),
        )
    }
}

impl<S: DocumentStore> ConfigStore<S> {
    /// Create a store from one handle per collection.
    ///
    /// `default_prefix` is what guilds without stored prefixes (and direct
    /// messages) get.
    pub fn new(
        bot_config: S,
        guild_config: S,
        name_history: S,
        default_prefix: impl Into<String>,
        cache: CacheConfig,
    ) -> Self {
        Self {
            bot_config: DocumentCache::new(BOT_CONFIG_COLLECTION, bot_config, cache.clone()),
            guild_config: DocumentCache::new(GUILD_CONFIG_COLLECTION, guild_config, cache),
            name_history,
            prefixes: Field::new("prefixes", vec![default_prefix.into()]),
            blacklist: Field::new("users", Vec::new()),
        }
    }

    // --- Prefixes ---

    /// Prefixes for a guild. `None` (direct messages) gets the default.
    pub async fn get_prefixes(&self, guild_id: Option<u64>) -> Result<Vec<String>> {
        let id = guild_id.map(DocumentId::Entity);
        self.guild_config.get(id.as_ref(), &self.prefixes).await
    }

    /// Replace a guild's prefixes. Duplicates are dropped.
    ///
    /// # Errors
    /// `Error::InvalidPrefixes` before anything is written, or the store error.
    pub async fn set_prefixes(&self, guild_id: u64, prefixes: Vec<String>) -> Result<()> {
        let prefixes = normalize_prefixes(prefixes)?;
        self.guild_config
            .set(&DocumentId::Entity(guild_id), &self.prefixes, prefixes)
            .await
    }

    /// Drop a guild's prefixes so it falls back to the default.
    pub async fn reset_prefixes(&self, guild_id: u64) -> Result<()> {
        self.guild_config
            .unset(&DocumentId::Entity(guild_id), &self.prefixes)
            .await
    }

    /// Every prefix a message may start with: mentions first, then stored ones.
    pub async fn command_prefixes(&self, guild_id: Option<u64>, bot_user_id: u64) -> Result<Vec<String>> {
        let mut prefixes = mention_prefixes(bot_user_id).to_vec();
        prefixes.extend(self.get_prefixes(guild_id).await?);
        Ok(prefixes)
    }

    // --- Blacklist ---

    /// Users the bot ignores.
    pub async fn get_blacklist(&self) -> Result<HashSet<u64>> {
        let users = self.bot_config.get(Some(&BLACKLIST_ID), &self.blacklist).await?;
        Ok(users.into_iter().collect())
    }

    /// Whether `user_id` is blacklisted.
    pub async fn is_blacklisted(&self, user_id: u64) -> Result<bool> {
        Ok(self.get_blacklist().await?.contains(&user_id))
    }

    pub async fn add_blacklist<I>(&self, user_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = u64>,
    {
        self.bot_config
            .add_to_set(&BLACKLIST_ID, &self.blacklist, user_ids)
            .await
    }

    pub async fn remove_blacklist<I>(&self, user_ids: I) -> Result<()>
    where
        I: IntoIterator<Item = u64>,
    {
        self.bot_config
            .pull(&BLACKLIST_ID, &self.blacklist, user_ids)
            .await
    }

    // --- Name history ---
    // Read straight from the store: histories only grow and are rarely viewed.

    /// Past names of a user, oldest first.
    pub async fn get_name_history(&self, user_id: u64) -> Result<Vec<String>> {
        let document = self.name_history.find_one(&DocumentId::Entity(user_id)).await?;

        match document.and_then(|mut d| d.remove(NAMES.name())) {
            Some(names) => NAMES.decode(names),
            None => Ok(NAMES.default_value()),
        }
    }

    /// Record a name the user no longer goes by.
    pub async fn add_name_history(&self, user_id: u64, name: impl Into<String>) -> Result<()> {
        let value = NAMES.encode_element(&name.into())?;

        self.name_history
            .update_one(&DocumentId::Entity(user_id), &Update::Push { field: NAMES.name(), value })
            .await?;
        debug!("Recorded name history for {}", user_id);
        Ok(())
    }

    /// A page of the user's name history, newest first.
    ///
    /// Returns `None` when there is no history or `page` is out of range.
    pub async fn name_history_page(&self, user_id: u64, page: usize) -> Result<Option<NameHistoryPage>> {
        let names = self.get_name_history(user_id).await?;
        Ok(paginate_newest_first(names, page))
    }

    /// The guild configuration cache.
    pub fn guild_config(&self) -> &DocumentCache<S> {
        &self.guild_config
    }

    /// The bot-wide configuration cache.
    pub fn bot_config(&self) -> &DocumentCache<S> {
        &self.bot_config
    }
}

fn paginate_newest_first(mut names: Vec<String>, page: usize) -> Option<NameHistoryPage> {
    if names.is_empty() || page == 0 {
        return None;
    }

    let pages = names.len().div_ceil(NAME_HISTORY_PAGE_SIZE);
    if page > pages {
        return None;
    }

    names.reverse();
    let names = names
        .into_iter()
        .skip((page - 1) * NAME_HISTORY_PAGE_SIZE)
        .take(NAME_HISTORY_PAGE_SIZE)
        .collect();

    Some(NameHistoryPage { names, page, pages })
}
