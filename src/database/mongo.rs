//! MongoDB database wrapper.

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::options::{ClientOptions, UpdateOptions};
use mongodb::{Client, Collection};
use tracing::{info, warn};

use super::{DocumentId, DocumentStore, Update};
use crate::config::Config;
use crate::error::Result;

/// Database wrapper for MongoDB operations.
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Connect to MongoDB using the connection settings from `config`.
    ///
    /// Reads and writes are retried by the driver; the cache layer above
    /// never retries on its own.
    ///
    /// # Errors
    /// Returns error if the URI is invalid or the server does not answer a ping.
    pub async fn connect(config: &Config) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.mongodb_uri).await?;
        if options.app_name.is_none() {
            options.app_name = Some(config.app_name.clone());
        }
        options.retry_writes = Some(true);
        options.retry_reads = Some(true);

        let client = Client::with_options(options)?;

        // Ping the database to verify connection
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        let db = client.database(&config.mongodb_database);

        Ok(Self { client, db })
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &mongodb::Database {
        &self.db
    }

    /// Get an untyped collection usable as a [`DocumentStore`].
    ///
    /// # Arguments
    /// * `name` - Collection name
    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    /// Close every connection held by the client.
    pub async fn shutdown(self) {
        info!("Closing MongoDB connections");
        self.client.shutdown().await;
    }
}

#[async_trait]
impl DocumentStore for Collection<Document> {
    async fn find_one(&self, id: &DocumentId) -> Result<Option<Document>> {
        let filter = doc! { "_id": id.to_bson()? };
        Ok(Collection::find_one(self, filter).await?)
    }

    async fn update_one(&self, id: &DocumentId, update: &Update) -> Result<()> {
        let filter = doc! { "_id": id.to_bson()? };
        let options = UpdateOptions::builder().upsert(true).build();

        Collection::update_one(self, filter, update.to_document())
            .with_options(options)
            .await
            .inspect_err(|e| {
                warn!(
                    "Update of {} in {} failed: {}",
                    id,
                    self.name(),
                    e
                )
            })?;

        Ok(())
    }
}
