use std::sync::Arc;

use super::Store;
use crate::registry::{EntityDefinitions, ModelDefinition, ModelRegistry};
use crate::value::{Fields, Value};

/// Configures a [`Store`] before it is shared.
pub struct StoreBuilder {
    registry: Arc<ModelRegistry>,
    definitions: EntityDefinitions,
    state: Fields,
}

impl StoreBuilder {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            definitions: EntityDefinitions::new(),
            state: Fields::new(),
        }
    }

    pub fn entity_definitions(mut self, definitions: EntityDefinitions) -> Self {
        self.definitions = definitions;
        self
    }

    /// Use the declared model `D` for new entities in `partition`.
    pub fn entity<D: ModelDefinition + 'static>(mut self, partition: impl Into<String>) -> Self {
        self.definitions.define::<D>(partition);
        self
    }

    /// Initial top-level state.
    pub fn state(mut self, state: Fields) -> Self {
        self.state = state;
        self
    }

    /// Set one initial top-level key.
    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Store {
        Store::from_parts(self.registry, self.state, self.definitions)
    }
}
