extern crate self as entity_store;

mod error;
mod merge;
mod record;
mod registry;
mod snapshot;
mod store;
mod value;

pub use error::{StoreError, StoreResult};
pub use merge::{EntityMerger, EntityPayload};
pub use record::{
    ChangeSet, Lifecycle, ListenerId, Publisher, Record, RecordKey, RecordRef, CHANGE_EVENT,
};
pub use registry::{
    instantiate, DefinitionFactory, EntityDefinitions, ModelDefinition, ModelFactory,
    ModelRegistry, ModelRegistryBuilder,
};
pub use snapshot::{
    GraphDeserializer, GraphSerializer, Pool, SerialFields, SerialValue, Snapshot, Token,
};
pub use store::{Store, StoreBuilder, STORE_TAG};
pub use value::{FieldValue, Fields, Value};

// Re-export the model! macro from the entity_store_macros crate
#[cfg(feature = "macros")]
pub use entity_store_macros::model;

/// Build a [`Fields`] mapping from `key => value` pairs.
///
/// ```ignore
/// let fields = entity_store::fields! { "name" => "Ada", "age" => 36 };
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        fields
    }};
}
