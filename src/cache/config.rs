//! Cache configuration.

use std::time::Duration;

/// Eviction policy for a document cache.
///
/// The default keeps every snapshot for the lifetime of the cache. Bounding
/// the capacity or setting a TTL/TTI makes evicted documents reload from the
/// store on their next read.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Maximum number of documents held in memory.
    /// `None` means unbounded.
    pub max_capacity: Option<u64>,

    /// Time-to-live for cached documents.
    /// After this duration, entries are automatically evicted.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cached documents.
    /// Entries are evicted if not accessed within this duration.
    pub tti: Option<Duration>,
}

impl CacheConfig {
    /// Create an unbounded cache config without expiry.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a new cache config with the given max capacity.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity: Some(max_capacity),
            ..Default::default()
        }
    }

    /// Set max capacity for cache (builder pattern).
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = Some(max_capacity);
        self
    }

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Set time-to-idle for cache entries.
    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Whether any eviction is configured at all.
    pub fn evicts(&self) -> bool {
        self.max_capacity.is_some() || self.ttl.is_some() || self.tti.is_some()
    }
}
