//! Persistent store adapter.
//!
//! The cache talks to its backing collection through [`DocumentStore`]:
//! a point lookup by id and an upserting field-level update. MongoDB
//! collections implement it in `mongo.rs`, [`MemoryStore`](super::MemoryStore)
//! in-process.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};

use super::DocumentId;
use crate::error::{Error, Result};

/// A field-level update operator, always applied with upsert semantics.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrite the field (`$set`).
    Set { field: &'static str, value: Bson },
    /// Set-union the values into an array field (`$addToSet` with `$each`).
    AddToSet { field: &'static str, values: Vec<Bson> },
    /// Remove every occurrence of the values from an array field (`$pull` with `$in`).
    Pull { field: &'static str, values: Vec<Bson> },
    /// Remove the field (`$unset`).
    Unset { field: &'static str },
    /// Append one value to an array field (`$push`).
    Push { field: &'static str, value: Bson },
}

impl Update {
    /// The field this update touches.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Set { field, .. }
            | Self::AddToSet { field, .. }
            | Self::Pull { field, .. }
            | Self::Unset { field }
            | Self::Push { field, .. } => field,
        }
    }

    /// Render the update as a MongoDB update document.
    pub fn to_document(&self) -> Document {
        match self {
            Self::Set { field, value } => doc! { "$set": { *field: value.clone() } },
            Self::AddToSet { field, values } => {
                doc! { "$addToSet": { *field: { "$each": values.clone() } } }
            }
            Self::Pull { field, values } => doc! { "$pull": { *field: { "$in": values.clone() } } },
            Self::Unset { field } => doc! { "$unset": { *field: "" } },
            Self::Push { field, value } => doc! { "$push": { *field: value.clone() } },
        }
    }

    /// Apply the update to an in-memory document the way the server would.
    ///
    /// `$pull` and `$unset` on a missing field leave the document untouched.
    /// Array operators on a non-array field fail without modifying anything.
    pub fn apply(&self, document: &mut Document) -> Result<()> {
        match self {
            Self::Set { field, value } => {
                document.insert(*field, value.clone());
            }
            Self::Unset { field } => {
                document.remove(*field);
            }
            Self::AddToSet { field, values } => {
                let array = array_entry(document, field)?;
                for value in values {
                    if !array.contains(value) {
                        array.push(value.clone());
                    }
                }
            }
            Self::Push { field, value } => {
                array_entry(document, field)?.push(value.clone());
            }
            Self::Pull { field, values } => match document.get_mut(*field) {
                Some(Bson::Array(array)) => array.retain(|v| !values.contains(v)),
                Some(_) => return Err(not_an_array(field)),
                None => {}
            },
        }
        Ok(())
    }
}

/// Get the array stored under `field`, creating an empty one if absent.
fn array_entry<'a>(document: &'a mut Document, field: &'static str) -> Result<&'a mut Vec<Bson>> {
    if !document.contains_key(field) {
        document.insert(field, Bson::Array(Vec::new()));
    }
    match document.get_mut(field) {
        Some(Bson::Array(array)) => Ok(array),
        _ => Err(not_an_array(field)),
    }
}

fn not_an_array(field: &'static str) -> Error {
    Error::NotAnArray { field }
}

/// A handle to a remote collection of documents keyed by [`DocumentId`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Look up a document by id. The returned document still carries `_id`.
    async fn find_one(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Apply `update` to the document with `id`, creating it if absent.
    async fn update_one(&self, id: &DocumentId, update: &Update) -> Result<()>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn find_one(&self, id: &DocumentId) -> Result<Option<Document>> {
        (**self).find_one(id).await
    }

    async fn update_one(&self, id: &DocumentId, update: &Update) -> Result<()> {
        (**self).update_one(id, update).await
    }
}
