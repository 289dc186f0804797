//! Registry - resolving type tags and partitions to record factories.
//!
//! Two tables use the same [`ModelFactory`] seam:
//! - [`ModelRegistry`] maps a type tag (as written in snapshots) to its factory.
//!   It is built once with [`ModelRegistryBuilder`] and read-only afterwards.
//! - [`EntityDefinitions`] maps a store partition key (e.g. `"users"`) to the
//!   factory used when `add_entities` meets an id that has no live record yet.
//!   Each store owns and may replace its own definitions.
//!
//! ## Example
//!
//! ```ignore
//! entity_store::model!(User { name: String = "anonymous" });
//!
//! let registry = ModelRegistry::builder().model::<User>().build()?;
//! let definitions = EntityDefinitions::new().with::<User>("users");
//! ```

mod definitions;

pub use definitions::EntityDefinitions;

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordRef};
use crate::store::Store;
use crate::value::Fields;

/// Builds the field set of a new record of one type.
pub trait ModelFactory: Send + Sync {
    /// The type tag written into snapshot tokens for records of this type.
    fn type_tag(&self) -> &str;

    /// Fields every new record starts with.
    fn default_state(&self) -> Fields;

    /// Produce the full field set from seed fields. The default overlays the
    /// seed on the default state.
    fn build(&self, seed: Fields) -> StoreResult<Fields> {
        let mut fields = self.default_state();
        fields.extend(seed);
        Ok(fields)
    }
}

/// A statically declared model type. Implemented by types generated with `model!`.
pub trait ModelDefinition: Sized {
    const TYPE: &'static str;

    fn default_state() -> Fields;

    /// Wrap a record without checking its type tag.
    fn wrap(record: RecordRef) -> Self;

    /// Wrap a record if its type tag matches.
    fn cast(record: RecordRef) -> Option<Self> {
        if record.type_tag() == Self::TYPE {
            Some(Self::wrap(record))
        } else {
            None
        }
    }

    fn factory() -> Arc<dyn ModelFactory>
    where
        Self: 'static,
    {
        Arc::new(DefinitionFactory::<Self>::new())
    }
}

/// Adapts a [`ModelDefinition`] to the [`ModelFactory`] seam.
pub struct DefinitionFactory<D> {
    _marker: PhantomData<fn() -> D>,
}

impl<D: ModelDefinition> DefinitionFactory<D> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<D: ModelDefinition> Default for DefinitionFactory<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ModelDefinition> ModelFactory for DefinitionFactory<D> {
    fn type_tag(&self) -> &str {
        D::TYPE
    }

    fn default_state(&self) -> Fields {
        D::default_state()
    }
}

/// Construct a live record through a factory.
pub fn instantiate(
    factory: &dyn ModelFactory,
    id: &str,
    seed: Fields,
    owner: Option<&Store>,
) -> StoreResult<RecordRef> {
    let record = Record::placeholder(factory.type_tag(), id);
    fill(&record, factory, seed)?;
    if let Some(store) = owner {
        record.set_owner(store);
    }
    Ok(record)
}

/// Build the fields of an existing placeholder in place.
pub(crate) fn fill(record: &Record, factory: &dyn ModelFactory, seed: Fields) -> StoreResult<()> {
    let fields = factory.build(seed)?;
    record.install(fields);
    Ok(())
}

/// Immutable type-tag to factory table used to restore snapshots.
pub struct ModelRegistry {
    factories: BTreeMap<String, Arc<dyn ModelFactory>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// A registry with no types. Snapshots holding records cannot be restored with it.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            factories: BTreeMap::new(),
        })
    }

    pub fn factory(&self, type_tag: &str) -> Option<&Arc<dyn ModelFactory>> {
        self.factories.get(type_tag)
    }

    pub fn contains(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// Collects factories, then freezes them into a [`ModelRegistry`].
#[derive(Default)]
pub struct ModelRegistryBuilder {
    factories: BTreeMap<String, Arc<dyn ModelFactory>>,
    duplicate: Option<String>,
}

impl ModelRegistryBuilder {
    /// Register a declared model type.
    pub fn model<D: ModelDefinition + 'static>(self) -> Self {
        self.factory(D::factory())
    }

    /// Register a hand-written factory under its own type tag.
    pub fn factory(mut self, factory: Arc<dyn ModelFactory>) -> Self {
        let type_tag = factory.type_tag().to_string();
        if self.factories.contains_key(&type_tag) {
            self.duplicate.get_or_insert(type_tag);
        } else {
            self.factories.insert(type_tag, factory);
        }
        self
    }

    pub fn build(self) -> StoreResult<Arc<ModelRegistry>> {
        if let Some(type_tag) = self.duplicate {
            return Err(StoreError::DuplicateModel(type_tag));
        }
        Ok(Arc::new(ModelRegistry {
            factories: self.factories,
        }))
    }
}
