//! In-process document store.
//!
//! Keeps documents in a `DashMap` and applies [`Update`] operators with the
//! same semantics as the server. Counts lookups and updates, and can be told
//! to fail, which makes it the backend of choice for exercising the cache.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mongodb::bson::{Document, doc};
use tracing::debug;

use super::{DocumentId, DocumentStore, Update};
use crate::error::{Error, Result};

/// A [`DocumentStore`] held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: DashMap<DocumentId, Document>,
    lookups: AtomicUsize,
    updates: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, bypassing the update counters.
    pub fn insert(&self, id: DocumentId, document: Document) {
        self.documents.insert(id, document);
    }

    /// Current stored document, without its `_id`.
    pub fn document(&self, id: &DocumentId) -> Option<Document> {
        self.documents.get(id).map(|d| d.value().clone())
    }

    /// Number of `find_one` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of successful `update_one` calls so far.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, id: &DocumentId) -> Result<Option<Document>> {
        // Suspension point, like a network round trip.
        tokio::task::yield_now().await;
        self.check_available()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let found = match self.documents.get(id) {
            Some(stored) => {
                let mut document = doc! { "_id": id.to_bson()? };
                document.extend(stored.value().clone());
                Some(document)
            }
            None => None,
        };
        debug!("Memory lookup for {}: {}", id, found.is_some());
        Ok(found)
    }

    async fn update_one(&self, id: &DocumentId, update: &Update) -> Result<()> {
        tokio::task::yield_now().await;
        self.check_available()?;

        // Work on a copy so a failed operator leaves the store as it was.
        match self.documents.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let mut document = occupied.get().clone();
                update.apply(&mut document)?;
                occupied.insert(document);
            }
            Entry::Vacant(vacant) => {
                let mut document = Document::new();
                update.apply(&mut document)?;
                vacant.insert(document);
            }
        }

        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
