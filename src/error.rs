//! Error types for the configuration store.

use thiserror::Error;

/// Errors surfaced by the document cache, the store adapters and the facade.
///
/// `Clone` so that a failed lookup shared by several concurrent readers of
/// the same document reaches every one of them unchanged.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The MongoDB driver reported a failure (connection, timeout, write concern).
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),

    /// A non-Mongo store backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A value could not be converted to BSON before being written.
    #[error("failed to encode field `{field}`: {reason}")]
    Encode { field: &'static str, reason: String },

    /// A stored value does not match the declared type of its field.
    #[error("failed to decode field `{field}`: {reason}")]
    Decode { field: &'static str, reason: String },

    /// An array operator hit a field that holds a non-array value.
    #[error("field `{field}` does not hold an array")]
    NotAnArray { field: &'static str },

    /// The document id cannot be represented as a store `_id`.
    #[error("invalid document id: {0}")]
    InvalidId(String),

    /// A prefix list was rejected before reaching the store.
    #[error("invalid prefixes: {0}")]
    InvalidPrefixes(String),
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
