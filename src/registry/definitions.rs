use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{ModelDefinition, ModelFactory};

/// Per-store map from partition key to the factory for new entities.
#[derive(Clone, Default)]
pub struct EntityDefinitions {
    factories: BTreeMap<String, Arc<dyn ModelFactory>>,
}

impl fmt::Debug for EntityDefinitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.factories
                    .iter()
                    .map(|(partition, factory)| (partition, factory.type_tag())),
            )
            .finish()
    }
}

impl EntityDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`define`](Self::define).
    pub fn with<D: ModelDefinition + 'static>(mut self, partition: impl Into<String>) -> Self {
        self.define::<D>(partition);
        self
    }

    /// Use the declared model `D` for new entities in `partition`.
    pub fn define<D: ModelDefinition + 'static>(&mut self, partition: impl Into<String>) {
        self.insert(partition, D::factory());
    }

    pub fn insert(&mut self, partition: impl Into<String>, factory: Arc<dyn ModelFactory>) {
        self.factories.insert(partition.into(), factory);
    }

    pub fn get(&self, partition: &str) -> Option<&Arc<dyn ModelFactory>> {
        self.factories.get(partition)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
