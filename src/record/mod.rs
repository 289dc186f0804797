//! Records - identity-bearing, observable units of mutable state.
//!
//! A record is addressed by `(type_tag, id)` and shared through [`RecordRef`].
//! Any number of partitions and nested fields may point at the same record;
//! an update through one reference is visible through all of them.
//!
//! Records referencing each other in a cycle keep each other alive for as long
//! as the cycle exists.

mod publisher;

pub use publisher::{ChangeSet, ListenerId, Publisher, CHANGE_EVENT};

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::store::{Store, StoreInner};
use crate::value::{FieldValue, Fields, Value};

/// Shared handle to a record. Identity is pointer identity.
pub type RecordRef = Rc<Record>;

/// The `(type_tag, id)` pair naming a record.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub type_tag: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(type_tag: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_tag, self.id)
    }
}

/// Construction state of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Allocated but its fields are still being resolved.
    Constructing,
    /// Fully built.
    Live,
}

pub struct Record {
    type_tag: String,
    id: String,
    state: RefCell<Fields>,
    lifecycle: Cell<Lifecycle>,
    owner: RefCell<Option<Weak<StoreInner>>>,
    publisher: RefCell<Publisher>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("type_tag", &self.type_tag)
            .field("id", &self.id)
            .field("lifecycle", &self.lifecycle.get())
            .finish_non_exhaustive()
    }
}

impl Record {
    /// Create a live record whose only field is `id`.
    pub fn new(type_tag: impl Into<String>, id: impl Into<String>) -> RecordRef {
        Self::with_state(type_tag, id, Fields::new())
    }

    /// Create a live record from a full field set.
    pub fn with_state(
        type_tag: impl Into<String>,
        id: impl Into<String>,
        fields: Fields,
    ) -> RecordRef {
        let record = Self::placeholder(type_tag, id);
        record.install(fields);
        record
    }

    /// Allocate an empty record in the `Constructing` state.
    pub(crate) fn placeholder(type_tag: impl Into<String>, id: impl Into<String>) -> RecordRef {
        Rc::new(Record {
            type_tag: type_tag.into(),
            id: id.into(),
            state: RefCell::new(Fields::new()),
            lifecycle: Cell::new(Lifecycle::Constructing),
            owner: RefCell::new(None),
            publisher: RefCell::new(Publisher::new()),
        })
    }

    /// Fill a placeholder with its built fields and mark it live.
    pub(crate) fn install(&self, mut fields: Fields) {
        fields
            .entry("id".to_string())
            .or_insert_with(|| Value::Text(self.id.clone()));
        *self.state.borrow_mut() = fields;
        self.lifecycle.set(Lifecycle::Live);
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.type_tag, &self.id)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    pub fn is_live(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Live
    }

    /// The store that created this record, if it is still alive.
    pub fn store(&self) -> Option<Store> {
        self.owner
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Store::from_inner)
    }

    pub(crate) fn set_owner(&self, store: &Store) {
        *self.owner.borrow_mut() = Some(store.downgrade());
    }

    /// A copy of the full field mapping.
    pub fn get_state(&self) -> Fields {
        self.state.borrow().clone()
    }

    /// Borrow the field mapping without copying it.
    pub fn borrow_state(&self) -> Ref<'_, Fields> {
        self.state.borrow()
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.state.borrow().get(field).cloned()
    }

    pub fn get_as<T: FieldValue>(&self, field: &str) -> Option<T> {
        self.state.borrow().get(field).and_then(T::from_value)
    }

    /// Whether the field holds a truthy value.
    pub fn has(&self, field: &str) -> bool {
        self.state
            .borrow()
            .get(field)
            .map(Value::is_truthy)
            .unwrap_or(false)
    }

    /// Set a single field. Returns true if the value changed.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) -> bool {
        let mut partial = Fields::new();
        partial.insert(field.into(), value.into());
        self.set_state(partial)
    }

    /// Merge a partial field set into this record.
    ///
    /// Fields whose new value is identical to the current one are ignored.
    /// If anything changed, the new values are visible immediately and one
    /// notification is published. Returns true if anything changed.
    pub fn set_state(&self, partial: Fields) -> bool {
        let (prev, next) = apply_diff(&self.state, partial);
        if next.is_empty() {
            return false;
        }

        debug!(record = %self.key(), ?next, ?prev, "record state changed");

        self.publisher.borrow_mut().publish(ChangeSet {
            type_tag: self.type_tag.clone(),
            id: self.id.clone(),
            fields: next.into_keys().collect(),
        });
        true
    }

    /// Register a change listener on this record.
    pub fn on_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(ChangeSet) + Send + Sync + 'static,
    {
        self.publisher.borrow_mut().subscribe(listener)
    }

    pub fn remove_listener(&self, id: &str) -> bool {
        self.publisher.borrow_mut().unsubscribe(id)
    }

    /// Wait until all notifications published by this record have been delivered.
    pub fn settle(&self) {
        self.publisher.borrow_mut().settle();
    }
}

/// Write every non-identical field of `partial` into `state`.
/// Returns the previous and new values of the fields that changed.
pub(crate) fn apply_diff(state: &RefCell<Fields>, partial: Fields) -> (Fields, Fields) {
    let mut prev = Fields::new();
    let mut next = Fields::new();
    let mut state = state.borrow_mut();

    for (field, value) in partial {
        let current = state.get(&field);
        if current.map(|c| c.identical(&value)).unwrap_or(false) {
            continue;
        }
        if let Some(current) = current {
            prev.insert(field.clone(), current.clone());
        }
        next.insert(field.clone(), value.clone());
        state.insert(field, value);
    }

    (prev, next)
}
