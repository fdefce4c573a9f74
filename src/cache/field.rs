//! Typed field declarations.
//!
//! A [`Field`] ties a stored field name to the Rust type of its value and the
//! fallback returned when the field is absent. Caches only accept declared
//! fields, so there is no way to ask for a field that has no default.

use mongodb::bson::{self, Bson};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A named document field with a typed default.
#[derive(Debug, Clone)]
pub struct Field<T> {
    name: &'static str,
    default: T,
}

impl<T> Field<T> {
    /// Declare a field stored under `name`, falling back to `default`.
    pub const fn new(name: &'static str, default: T) -> Self {
        Self { name, default }
    }

    /// Name of the field in the stored document.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Clone> Field<T> {
    /// The value substituted for a missing field.
    pub fn default_value(&self) -> T {
        self.default.clone()
    }
}

impl<T: Serialize> Field<T> {
    pub(crate) fn encode(&self, value: &T) -> Result<Bson> {
        encode_value(self.name, value)
    }
}

impl<T: DeserializeOwned> Field<T> {
    pub(crate) fn decode(&self, value: Bson) -> Result<T> {
        bson::from_bson(value).map_err(|e| Error::Decode {
            field: self.name,
            reason: e.to_string(),
        })
    }
}

impl<E: Serialize> Field<Vec<E>> {
    /// Encode one element of an array field.
    pub(crate) fn encode_element(&self, value: &E) -> Result<Bson> {
        encode_value(self.name, value)
    }

    /// Encode the elements of a set-valued field one by one.
    pub(crate) fn encode_elements<I>(&self, values: I) -> Result<Vec<Bson>>
    where
        I: IntoIterator<Item = E>,
    {
        values
            .into_iter()
            .map(|value| self.encode_element(&value))
            .collect()
    }
}

fn encode_value<V: Serialize + ?Sized>(field: &'static str, value: &V) -> Result<Bson> {
    bson::to_bson(value).map_err(|e| Error::Encode {
        field,
        reason: e.to_string(),
    })
}
