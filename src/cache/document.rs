//! Cache-aside document cache.
//!
//! Mirrors a remote collection in memory, one snapshot per document id.
//! Snapshots are loaded lazily on first access, every mutation is written to
//! the store before the snapshot is touched, and missing fields resolve to
//! the field's declared default.

use std::sync::Arc;

use moka::future::Cache;
use mongodb::bson::{Bson, Document};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::{CacheConfig, Field};
use crate::database::{DocumentId, DocumentStore, Update};
use crate::error::Result;

/// In-memory copy of one document's fields, without `_id`.
///
/// A complete snapshot mirrors the whole stored document; an empty complete
/// snapshot records that the store holds no document for the id. A partial
/// snapshot only knows the fields that were `set` through this cache before
/// the document was ever read.
#[derive(Debug, Default)]
struct Snapshot {
    fields: Document,
    complete: bool,
}

impl Snapshot {
    fn loaded(fields: Document) -> Self {
        Self { fields, complete: true }
    }

    /// Whether applying `update` here yields what the store now holds.
    fn covers(&self, update: &Update) -> bool {
        self.complete
            || matches!(update, Update::Set { .. } | Update::Unset { .. })
            || self.fields.contains_key(update.field())
    }
}

type SharedSnapshot = Arc<RwLock<Snapshot>>;

/// Lazily populated, write-through cache over one [`DocumentStore`].
///
/// Concurrent first reads of the same id share a single store lookup.
/// Concurrent mutations of the same id are not serialized: the store
/// applies both, the snapshot reflects them in completion order.
pub struct DocumentCache<S> {
    name: Arc<str>,
    store: S,
    snapshots: Cache<DocumentId, SharedSnapshot>,
}

impl<S: DocumentStore> DocumentCache<S> {
    /// Create a cache named `name` over `store`.
    pub fn new(name: impl Into<Arc<str>>, store: S, config: CacheConfig) -> Self {
        let mut builder = Cache::builder();

        if let Some(capacity) = config.max_capacity {
            builder = builder.max_capacity(capacity);
        }

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            name: name.into(),
            store,
            snapshots: builder.build(),
        }
    }

    /// Get the name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The store backing this cache.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read `field` of document `id`.
    ///
    /// `None` stands for "no document": the default is returned without
    /// consulting the cache or the store. Otherwise the first read of an id
    /// performs one store lookup and every later read is served from memory.
    ///
    /// # Errors
    /// Store failures during the first lookup, or a stored value that does
    /// not decode as `T`.
    pub async fn get<T>(&self, id: Option<&DocumentId>, field: &Field<T>) -> Result<T>
    where
        T: Clone + DeserializeOwned,
    {
        let Some(id) = id else {
            return Ok(field.default_value());
        };

        let value = match self.lookup(id, field.name()).await? {
            (None, false) => {
                // Only written fields are known; fetch the rest.
                self.snapshots.invalidate(id).await;
                self.lookup(id, field.name()).await?.0
            }
            (value, _) => value,
        };

        match value {
            Some(value) => field.decode(value),
            None => Ok(field.default_value()),
        }
    }

    /// Overwrite `field` of document `id` with `value`.
    pub async fn set<T>(&self, id: &DocumentId, field: &Field<T>, value: T) -> Result<()>
    where
        T: Serialize,
    {
        let value = field.encode(&value)?;
        self.write(id, Update::Set { field: field.name(), value }).await
    }

    /// Add `values` to the set stored in `field`, skipping ones already present.
    pub async fn add_to_set<E, I>(&self, id: &DocumentId, field: &Field<Vec<E>>, values: I) -> Result<()>
    where
        E: Serialize,
        I: IntoIterator<Item = E>,
    {
        let values = field.encode_elements(values)?;
        self.write(id, Update::AddToSet { field: field.name(), values }).await
    }

    /// Remove every occurrence of `values` from the set stored in `field`.
    pub async fn pull<E, I>(&self, id: &DocumentId, field: &Field<Vec<E>>, values: I) -> Result<()>
    where
        E: Serialize,
        I: IntoIterator<Item = E>,
    {
        let values = field.encode_elements(values)?;
        self.write(id, Update::Pull { field: field.name(), values }).await
    }

    /// Remove `field` from document `id`. Missing documents and fields are fine.
    pub async fn unset<T>(&self, id: &DocumentId, field: &Field<T>) -> Result<()> {
        self.write(id, Update::Unset { field: field.name() }).await
    }

    /// Whether a snapshot for `id` is currently held.
    pub fn is_loaded(&self, id: &DocumentId) -> bool {
        self.snapshots.contains_key(id)
    }

    /// Drop the snapshot for `id`; the next read goes to the store.
    pub async fn invalidate(&self, id: &DocumentId) {
        self.snapshots.invalidate(id).await;
        debug!("Invalidated {} in {}", id, self.name);
    }

    /// Drop every snapshot.
    pub fn invalidate_all(&self) {
        self.snapshots.invalidate_all();
        debug!("Invalidated all documents in {}", self.name);
    }

    /// Get the number of documents held in memory.
    ///
    /// Note: This may lag behind recent inserts until pending maintenance runs.
    pub fn entry_count(&self) -> u64 {
        self.snapshots.entry_count()
    }

    /// Read `field` from the snapshot of `id`, along with whether the
    /// snapshot is complete.
    async fn lookup(&self, id: &DocumentId, field: &str) -> Result<(Option<Bson>, bool)> {
        let snapshot = self.snapshot(id).await?;
        let guard = snapshot.read();
        Ok((guard.fields.get(field).cloned(), guard.complete))
    }

    /// Return the snapshot for `id`, loading it from the store on a miss.
    async fn snapshot(&self, id: &DocumentId) -> Result<SharedSnapshot> {
        if let Some(snapshot) = self.snapshots.get(id).await {
            return Ok(snapshot);
        }

        self.snapshots
            .try_get_with(id.clone(), self.load(id))
            .await
            .map_err(Arc::unwrap_or_clone)
    }

    async fn load(&self, id: &DocumentId) -> Result<SharedSnapshot> {
        info!("Getting {} from {}", id, self.name);

        let document = match self.store.find_one(id).await? {
            Some(mut document) => {
                document.remove("_id");
                document
            }
            None => Document::new(),
        };

        Ok(Arc::new(RwLock::new(Snapshot::loaded(document))))
    }

    /// Write `update` to the store, then mirror it into the snapshot.
    ///
    /// A `Set` on an unloaded id starts a partial snapshot holding just that
    /// field. Any other operator on an unloaded id leaves it unloaded, since
    /// its result depends on stored values this cache has not seen.
    async fn write(&self, id: &DocumentId, update: Update) -> Result<()> {
        self.store.update_one(id, &update).await?;

        let snapshot = if matches!(update, Update::Set { .. }) {
            Some(
                self.snapshots
                    .get_with(id.clone(), async { SharedSnapshot::default() })
                    .await,
            )
        } else {
            self.snapshots.get(id).await
        };

        let Some(snapshot) = snapshot else {
            debug!("Wrote {} of {} in {}, left unloaded", update.field(), id, self.name);
            return Ok(());
        };

        let applied = {
            let mut guard = snapshot.write();
            guard
                .covers(&update)
                .then(|| update.apply(&mut guard.fields))
        };

        match applied {
            Some(Ok(())) => debug!("Updated {} of {} in {}", update.field(), id, self.name),
            Some(Err(e)) => {
                // The store accepted the write; reload instead of guessing.
                warn!("Dropping snapshot of {} in {}: {}", id, self.name, e);
                self.snapshots.invalidate(id).await;
            }
            None => {
                debug!("Dropping partial snapshot of {} in {}", id, self.name);
                self.snapshots.invalidate(id).await;
            }
        }

        Ok(())
    }
}

impl<S> std::fmt::Debug for DocumentCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("name", &self.name)
            .field("entry_count", &self.snapshots.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mongodb::bson::doc;

    use super::*;
    use crate::database::MemoryStore;
    use crate::error::Error;

    fn prefixes() -> Field<Vec<String>> {
        Field::new("prefixes", vec!["?".to_string()])
    }

    fn users() -> Field<Vec<u64>> {
        Field::new("users", Vec::new())
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn sorted(mut values: Vec<u64>) -> Vec<u64> {
        values.sort_unstable();
        values
    }

    fn cache() -> (Arc<MemoryStore>, DocumentCache<Arc<MemoryStore>>) {
        let store = Arc::new(MemoryStore::new());
        let cache = DocumentCache::new("test", Arc::clone(&store), CacheConfig::default());
        (store, cache)
    }

    #[tokio::test]
    async fn test_default_for_unknown_document() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(1);

        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["?"]));
        assert!(cache.get(Some(&id), &users()).await.unwrap().is_empty());
        assert_eq!(store.lookups(), 1);
        assert!(cache.is_loaded(&id));
    }

    #[tokio::test]
    async fn test_single_lookup_per_document() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(7);
        store.insert(id.clone(), doc! { "prefixes": ["!", "?"] });

        for _ in 0..3 {
            let value = cache.get(Some(&id), &prefixes()).await.unwrap();
            assert_eq!(value, strings(&["!", "?"]));
        }

        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_reads_share_lookup() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(3);
        store.insert(id.clone(), doc! { "prefixes": ["$"] });
        let field = prefixes();

        let (a, b) = futures::join!(cache.get(Some(&id), &field), cache.get(Some(&id), &field));

        assert_eq!(a.unwrap(), strings(&["$"]));
        assert_eq!(b.unwrap(), strings(&["$"]));
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_missing_id_short_circuits() {
        let (store, cache) = cache();
        cache
            .set(&DocumentId::Entity(1), &prefixes(), strings(&["!"]))
            .await
            .unwrap();

        let value = cache.get(None, &prefixes()).await.unwrap();

        assert_eq!(value, strings(&["?"]));
        assert_eq!(store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_set_is_write_through() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(1);

        cache.set(&id, &prefixes(), strings(&["!", "?"])).await.unwrap();
        let value = cache.get(Some(&id), &prefixes()).await.unwrap();

        assert_eq!(value, strings(&["!", "?"]));
        assert_eq!(store.lookups(), 0);
        assert_eq!(store.document(&id), Some(doc! { "prefixes": ["!", "?"] }));
    }

    #[tokio::test]
    async fn test_set_semantics() {
        let (store, cache) = cache();
        let id = DocumentId::Key("blacklist");

        cache.add_to_set(&id, &users(), [1, 2]).await.unwrap();
        cache.add_to_set(&id, &users(), [2, 3]).await.unwrap();
        assert_eq!(sorted(cache.get(Some(&id), &users()).await.unwrap()), vec![1, 2, 3]);

        cache.pull(&id, &users(), [2]).await.unwrap();
        assert_eq!(sorted(cache.get(Some(&id), &users()).await.unwrap()), vec![1, 3]);

        let stored = store.document(&id).unwrap();
        assert_eq!(stored.get_array("users").unwrap().len(), 2);
    }

    fn lang() -> Field<String> {
        Field::new("lang", "en".to_string())
    }

    #[tokio::test]
    async fn test_add_to_set_on_unloaded_document_keeps_stored_values() {
        let (store, cache) = cache();
        let id = DocumentId::Key("blacklist");
        store.insert(id.clone(), doc! { "users": [1i64, 2i64] });

        cache.add_to_set(&id, &users(), [3]).await.unwrap();

        assert!(!cache.is_loaded(&id));
        assert_eq!(sorted(cache.get(Some(&id), &users()).await.unwrap()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pull_on_unloaded_document_keeps_stored_values() {
        let (store, cache) = cache();
        let id = DocumentId::Key("blacklist");
        store.insert(id.clone(), doc! { "users": [1i64, 2i64, 3i64] });

        cache.pull(&id, &users(), [2]).await.unwrap();

        assert_eq!(sorted(cache.get(Some(&id), &users()).await.unwrap()), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_unset_on_unloaded_document_keeps_other_fields() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(12);
        store.insert(id.clone(), doc! { "prefixes": ["!"], "lang": "pl" });

        cache.unset(&id, &prefixes()).await.unwrap();

        assert_eq!(cache.get(Some(&id), &lang()).await.unwrap(), "pl");
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["?"]));
    }

    #[tokio::test]
    async fn test_set_on_unloaded_document_keeps_other_fields() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(13);
        store.insert(id.clone(), doc! { "lang": "pl" });

        cache.set(&id, &prefixes(), strings(&["!"])).await.unwrap();
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["!"]));
        assert_eq!(store.lookups(), 0);

        assert_eq!(cache.get(Some(&id), &lang()).await.unwrap(), "pl");
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["!"]));
        assert_eq!(store.lookups(), 1);
    }

    #[tokio::test]
    async fn test_set_operator_after_set_on_unloaded_document() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(14);
        store.insert(id.clone(), doc! { "users": [1i64] });

        cache.set(&id, &prefixes(), strings(&["!"])).await.unwrap();
        cache.add_to_set(&id, &users(), [2]).await.unwrap();

        assert_eq!(sorted(cache.get(Some(&id), &users()).await.unwrap()), vec![1, 2]);
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["!"]));
    }

    #[tokio::test]
    async fn test_unset_missing_field() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(5);

        cache.unset(&id, &prefixes()).await.unwrap();

        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["?"]));
        assert_eq!(store.updates(), 1);
    }

    #[tokio::test]
    async fn test_unset_restores_default() {
        let (_store, cache) = cache();
        let id = DocumentId::Entity(5);

        cache.set(&id, &prefixes(), strings(&["!"])).await.unwrap();
        cache.unset(&id, &prefixes()).await.unwrap();

        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["?"]));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(9);
        cache.get(Some(&id), &users()).await.unwrap();
        cache.set(&id, &prefixes(), strings(&["!"])).await.unwrap();

        store.set_failing(true);
        let err = cache.set(&id, &prefixes(), strings(&["%"])).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        let err = cache.add_to_set(&id, &users(), [1]).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));

        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["!"]));
        assert!(cache.get(Some(&id), &users()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_on_unloaded_document_creates_nothing() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(9);

        store.set_failing(true);
        cache.unset(&id, &prefixes()).await.unwrap_err();

        assert!(!cache.is_loaded(&id));
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(2);
        store.insert(id.clone(), doc! { "prefixes": ["!"] });

        store.set_failing(true);
        assert!(cache.get(Some(&id), &prefixes()).await.is_err());
        assert!(!cache.is_loaded(&id));

        store.set_failing(false);
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["!"]));
    }

    #[tokio::test]
    async fn test_loaded_snapshot_survives_store_outage() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(2);
        store.insert(id.clone(), doc! { "prefixes": ["!"] });
        cache.get(Some(&id), &prefixes()).await.unwrap();

        store.set_failing(true);

        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["!"]));
    }

    #[tokio::test]
    async fn test_id_field_is_stripped() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(4);
        store.insert(id.clone(), doc! { "prefixes": ["!"] });

        cache.get(Some(&id), &prefixes()).await.unwrap();
        let id_field: Field<i64> = Field::new("_id", -1);

        assert_eq!(cache.get(Some(&id), &id_field).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_wrong_stored_type_is_an_error() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(4);
        store.insert(id.clone(), doc! { "prefixes": 12 });

        let err = cache.get(Some(&id), &prefixes()).await.unwrap_err();

        assert!(matches!(err, Error::Decode { field: "prefixes", .. }));
    }

    #[tokio::test]
    async fn test_invalidate_reloads() {
        let (store, cache) = cache();
        let id = DocumentId::Entity(8);
        cache.get(Some(&id), &prefixes()).await.unwrap();

        // Written by another process.
        store.insert(id.clone(), doc! { "prefixes": ["&"] });
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["?"]));

        cache.invalidate(&id).await;
        assert_eq!(cache.get(Some(&id), &prefixes()).await.unwrap(), strings(&["&"]));
        assert_eq!(store.lookups(), 2);
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_reloaded() {
        let store = Arc::new(MemoryStore::new());
        let cache = DocumentCache::new(
            "expiring",
            Arc::clone(&store),
            CacheConfig::unbounded().ttl(Duration::from_millis(20)),
        );
        let id = DocumentId::Entity(1);

        cache.get(Some(&id), &prefixes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.get(Some(&id), &prefixes()).await.unwrap();

        assert_eq!(store.lookups(), 2);
    }
}
