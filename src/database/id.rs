//! Document identifiers.

use std::fmt;

use mongodb::bson::Bson;

use crate::error::{Error, Result};

/// Identifies one document within one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    /// A platform entity: guild, user.
    Entity(u64),
    /// A fixed, named document such as the global blacklist.
    Key(&'static str),
}

impl DocumentId {
    /// Render the id as the `_id` value used by the store.
    ///
    /// # Errors
    /// Entity ids above `i64::MAX` have no BSON integer representation.
    pub fn to_bson(&self) -> Result<Bson> {
        match self {
            Self::Entity(id) => i64::try_from(*id)
                .map(Bson::Int64)
                .map_err(|_| Error::InvalidId(format!("entity id {id} exceeds i64 range"))),
            Self::Key(key) => Ok(Bson::String((*key).to_string())),
        }
    }
}

impl From<u64> for DocumentId {
    fn from(id: u64) -> Self {
        Self::Entity(id)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(id) => write!(f, "{id}"),
            Self::Key(key) => f.write_str(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_bson() {
        assert_eq!(DocumentId::Entity(42).to_bson().unwrap(), Bson::Int64(42));
        assert_eq!(
            DocumentId::Key("blacklist").to_bson().unwrap(),
            Bson::String("blacklist".to_string())
        );
    }

    #[test]
    fn test_to_bson_out_of_range() {
        let err = DocumentId::Entity(u64::MAX).to_bson().unwrap_err();
        assert!(matches!(err, Error::InvalidId(_)));
    }
}
