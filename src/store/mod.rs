//! Store - observable, normalized state holding partitions of records.
//!
//! Top-level state is a mapping. Entity partitions live under partition keys
//! (e.g. `"users"`) as `id -> record` maps; any other keys hold plain values.
//! The whole state, cycles included, round-trips through [`Store::stringify`]
//! and [`Store::parse`].
//!
//! ## Example
//!
//! ```ignore
//! entity_store::model!(User { name: String = "anonymous", friend: RecordRef });
//!
//! let registry = ModelRegistry::builder().model::<User>().build()?;
//! let store = Store::builder(registry)
//!     .entity_definitions(EntityDefinitions::new().with::<User>("users"))
//!     .build();
//!
//! store.add_entities(EntityPayload::from_json(json!({"users": {"u1": {"name": "Ada"}}}))?)?;
//! let text = store.stringify(&[])?;
//! ```

mod builder;

pub use builder::StoreBuilder;

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::merge::{EntityMerger, EntityPayload};
use crate::record::{apply_diff, ChangeSet, ListenerId, Publisher, RecordRef};
use crate::registry::{EntityDefinitions, ModelDefinition, ModelRegistry};
use crate::snapshot::{GraphDeserializer, GraphSerializer, Snapshot};
use crate::value::{Fields, Value};

/// Type tag carried by change notifications published by a store.
pub const STORE_TAG: &str = "Store";

pub(crate) struct StoreInner {
    registry: Arc<ModelRegistry>,
    state: RefCell<Fields>,
    definitions: RefCell<EntityDefinitions>,
    publisher: RefCell<Publisher>,
}

/// Handle to a store. Clones share the same state.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.inner.state.borrow().keys().collect::<Vec<_>>())
            .field("entity_definitions", &*self.inner.definitions.borrow())
            .finish()
    }
}

impl Store {
    /// Create an empty store restoring snapshots through `registry`.
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self::builder(registry).build()
    }

    pub fn builder(registry: Arc<ModelRegistry>) -> StoreBuilder {
        StoreBuilder::new(registry)
    }

    pub(crate) fn from_parts(
        registry: Arc<ModelRegistry>,
        state: Fields,
        definitions: EntityDefinitions,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                registry,
                state: RefCell::new(state),
                definitions: RefCell::new(definitions),
                publisher: RefCell::new(Publisher::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Rc::downgrade(&self.inner)
    }

    /// Whether two handles refer to the same store.
    pub fn same_store(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.inner.registry
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    /// A copy of the top-level state mapping. Records are shared, not copied.
    pub fn get_state(&self) -> Fields {
        self.inner.state.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().get(key).cloned()
    }

    /// The `id -> value` map stored under a partition key.
    pub fn partition(&self, key: &str) -> Option<Fields> {
        self.inner
            .state
            .borrow()
            .get(key)
            .and_then(Value::as_map)
            .cloned()
    }

    /// The live record stored at `partition[id]`.
    pub fn entity(&self, partition: &str, id: &str) -> Option<RecordRef> {
        self.inner
            .state
            .borrow()
            .get(partition)
            .and_then(Value::as_map)
            .and_then(|entities| entities.get(id))
            .and_then(Value::as_record)
            .cloned()
    }

    /// Typed form of [`entity`](Self::entity).
    pub fn entity_as<D: ModelDefinition>(&self, partition: &str, id: &str) -> Option<D> {
        self.entity(partition, id).and_then(D::cast)
    }

    /// Merge `partial` into the top-level state.
    ///
    /// Keys whose value is identical to the current one are ignored. If any
    /// key changed, one notification is published. Returns true if anything changed.
    pub fn set_state(&self, partial: Fields) -> bool {
        let (prev, next) = apply_diff(&self.inner.state, partial);
        if next.is_empty() {
            return false;
        }

        debug!(keys = ?next.keys().collect::<Vec<_>>(), replaced = prev.len(), "store state changed");

        self.inner.publisher.borrow_mut().publish(ChangeSet {
            type_tag: STORE_TAG.to_string(),
            id: String::new(),
            fields: next.into_keys().collect(),
        });
        true
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Serialize the state, or only `keys` of it, to snapshot text.
    /// An empty `keys` slice selects the whole state.
    pub fn stringify(&self, keys: &[&str]) -> StoreResult<String> {
        self.snapshot(keys).to_json()
    }

    /// Typed form of [`stringify`](Self::stringify).
    pub fn snapshot(&self, keys: &[&str]) -> Snapshot {
        let state = self.inner.state.borrow();
        let selected;
        let source = if keys.is_empty() {
            &*state
        } else {
            selected = keys
                .iter()
                .filter_map(|key| match state.get(*key) {
                    Some(value) => Some((key.to_string(), value.clone())),
                    None => {
                        warn!(key, "stringify key not in state");
                        None
                    }
                })
                .collect::<Fields>();
            &selected
        };

        let snapshot = GraphSerializer::serialize_state(&self.inner.registry, source);
        debug!(
            keys = snapshot.state.len(),
            records = snapshot.pooled_count(),
            "serialized store state"
        );
        snapshot
    }

    /// Replace the whole state with the contents of snapshot text.
    /// On error the current state is left untouched.
    pub fn parse(&self, text: &str) -> StoreResult<()> {
        let snapshot = Snapshot::from_json(text)?;
        self.restore(&snapshot)
    }

    /// Merge the top-level keys of snapshot text into the current state.
    /// On error the current state is left untouched.
    pub fn parse_merge(&self, text: &str) -> StoreResult<()> {
        let snapshot = Snapshot::from_json(text)?;
        self.restore_merge(&snapshot)
    }

    /// Typed form of [`parse`](Self::parse).
    pub fn restore(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let state = self.rebuild(snapshot)?;
        debug!(keys = state.len(), "restored store state");
        *self.inner.state.borrow_mut() = state;
        Ok(())
    }

    /// Typed form of [`parse_merge`](Self::parse_merge).
    pub fn restore_merge(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let state = self.rebuild(snapshot)?;
        debug!(keys = state.len(), "merged restored state");
        self.inner.state.borrow_mut().extend(state);
        Ok(())
    }

    /// Rebuild the snapshot's state with every record owned by this store.
    fn rebuild(&self, snapshot: &Snapshot) -> StoreResult<Fields> {
        GraphDeserializer::new(&self.inner.registry, &snapshot.models)
            .owned_by(self)
            .deserialize_fields(&snapshot.state)
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Merge normalized entity data into the store.
    ///
    /// Live records are updated in place; missing ones are created through the
    /// store's entity definitions. The merged partitions are then installed
    /// with a single [`set_state`](Self::set_state).
    pub fn add_entities(&self, payload: EntityPayload) -> StoreResult<bool> {
        let merged = {
            let current = self.inner.state.borrow();
            let definitions = self.inner.definitions.borrow();
            EntityMerger::new(&definitions)
                .owned_by(self)
                .merge(payload, &current)?
        };
        Ok(self.set_state(merged))
    }

    pub fn entity_definitions(&self) -> EntityDefinitions {
        self.inner.definitions.borrow().clone()
    }

    pub fn set_entity_definitions(&self, definitions: EntityDefinitions) {
        *self.inner.definitions.borrow_mut() = definitions;
    }

    /// Use the declared model `D` for new entities in `partition`.
    pub fn define_entity<D: ModelDefinition + 'static>(&self, partition: &str) {
        self.inner.definitions.borrow_mut().define::<D>(partition);
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(ChangeSet) + Send + Sync + 'static,
    {
        self.inner.publisher.borrow_mut().subscribe(listener)
    }

    pub fn remove_listener(&self, id: &str) -> bool {
        self.inner.publisher.borrow_mut().unsubscribe(id)
    }

    /// Wait until all store notifications published so far have been delivered.
    pub fn settle(&self) {
        self.inner.publisher.borrow_mut().settle();
    }
}
