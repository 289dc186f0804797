use std::collections::HashMap;

use tracing::trace;

use super::{Pool, SerialFields, SerialValue, Snapshot, Token};
use crate::error::{StoreError, StoreResult};
use crate::record::{Record, RecordKey, RecordRef};
use crate::registry::{fill, ModelRegistry};
use crate::store::Store;
use crate::value::{Fields, Value};

/// A record rebuilt during this walk.
enum Built {
    /// Placeholder registered, fields still being resolved.
    InProgress(RecordRef),
    Done(RecordRef),
}

impl Built {
    fn record(&self) -> &RecordRef {
        match self {
            Built::InProgress(record) | Built::Done(record) => record,
        }
    }
}

/// Rebuilds live values from a token tree and its pool.
///
/// The first encounter of a token constructs the record; later encounters,
/// including ones reached from inside the record's own fields, return the same
/// instance. A placeholder is registered before its fields are resolved, so a
/// cyclic reference resolves to the record under construction.
pub struct GraphDeserializer<'a> {
    registry: &'a ModelRegistry,
    pool: &'a Pool,
    owner: Option<&'a Store>,
    built: HashMap<RecordKey, Built>,
}

impl<'a> GraphDeserializer<'a> {
    pub fn new(registry: &'a ModelRegistry, pool: &'a Pool) -> Self {
        Self {
            registry,
            pool,
            owner: None,
            built: HashMap::new(),
        }
    }

    /// Give every rebuilt record a back-reference to `store`.
    pub fn owned_by(mut self, store: &'a Store) -> Self {
        self.owner = Some(store);
        self
    }

    /// Rebuild the state mapping of a snapshot.
    pub fn deserialize_state(registry: &ModelRegistry, snapshot: &Snapshot) -> StoreResult<Fields> {
        GraphDeserializer::new(registry, &snapshot.models).deserialize_fields(&snapshot.state)
    }

    pub fn deserialize_value(&mut self, value: &SerialValue) -> StoreResult<Value> {
        Ok(match value {
            SerialValue::Null => Value::Null,
            SerialValue::Bool(b) => Value::Bool(*b),
            SerialValue::Number(n) => Value::Number(n.clone()),
            SerialValue::Text(s) => Value::Text(s.clone()),
            SerialValue::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.deserialize_value(item))
                    .collect::<StoreResult<_>>()?,
            ),
            SerialValue::Map(fields) => Value::Map(self.deserialize_fields(fields)?),
            SerialValue::Token(token) => Value::Record(self.resolve(token)?),
        })
    }

    pub fn deserialize_fields(&mut self, fields: &SerialFields) -> StoreResult<Fields> {
        fields
            .iter()
            .map(|(key, value)| {
                self.deserialize_value(value)
                    .map(|value| (key.clone(), value))
            })
            .collect()
    }

    fn resolve(&mut self, token: &Token) -> StoreResult<RecordRef> {
        let key = token.key();
        if let Some(built) = self.built.get(&key) {
            trace!(record = %key, "reusing rebuilt record");
            return Ok(built.record().clone());
        }

        let registry = self.registry;
        let pool = self.pool;
        let factory = registry
            .factory(&token.type_tag)
            .ok_or_else(|| StoreError::unresolved(&token.type_tag, &token.id))?;
        let serial = pool
            .get(&token.type_tag)
            .and_then(|records| records.get(&token.id))
            .ok_or_else(|| StoreError::unresolved(&token.type_tag, &token.id))?;

        let record = Record::placeholder(&token.type_tag, &token.id);
        self.built
            .insert(key.clone(), Built::InProgress(record.clone()));

        let fields = self.deserialize_fields(serial)?;
        fill(&record, factory.as_ref(), fields)?;
        if let Some(store) = self.owner {
            record.set_owner(store);
        }
        self.built.insert(key, Built::Done(record.clone()));

        Ok(record)
    }

    /// Number of records rebuilt so far.
    pub fn built_count(&self) -> usize {
        self.built.len()
    }

    /// Whether any record is still waiting for its fields. Only true mid-walk.
    pub fn has_pending(&self) -> bool {
        self.built
            .values()
            .any(|built| matches!(built, Built::InProgress(_)))
    }
}
