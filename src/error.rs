use thiserror::Error;

/// Errors raised by the entity store, its snapshot codec, and the merger.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A `{_constructor, _id}` token names a type missing from the registry,
    /// or an id missing from the snapshot pool. Aborts the whole restore.
    #[error("unresolved reference {type_tag}:{id}")]
    UnresolvedReference { type_tag: String, id: String },

    /// Snapshot text is not JSON, or does not have the `{state, models}` shape.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Entity payload is not shaped `partition -> id -> fields`.
    #[error("malformed entity payload: {0}")]
    MalformedPayload(String),

    /// `add_entities` needed to create a record for a partition with no definition.
    #[error("no entity definition for partition {0}")]
    UnknownEntityDefinition(String),

    /// A type tag was registered twice in the same registry.
    #[error("model type {0} registered twice")]
    DuplicateModel(String),

    /// A factory refused to build a record.
    #[error("failed to construct {type_tag}:{id}: {reason}")]
    Construction {
        type_tag: String,
        id: String,
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn unresolved(type_tag: &str, id: &str) -> Self {
        StoreError::UnresolvedReference {
            type_tag: type_tag.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::MalformedSnapshot(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
