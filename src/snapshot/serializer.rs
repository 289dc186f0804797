use std::collections::HashMap;

use tracing::trace;

use super::{Pool, SerialFields, SerialValue, Snapshot, Token};
use crate::record::{Record, RecordKey};
use crate::registry::ModelRegistry;
use crate::value::{Fields, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Visit {
    /// Pool slot claimed, fields still being walked.
    InProgress,
    Done,
}

/// Turns a live value graph into a token tree plus a pool.
///
/// Each distinct record is serialized at most once. Its slot is claimed before
/// its own fields are walked, so a record reached again through a cycle is
/// emitted as a token without descending a second time.
pub struct GraphSerializer {
    pool: Pool,
    visits: HashMap<RecordKey, Visit>,
    back_references: usize,
}

impl GraphSerializer {
    /// Start a pool with one empty partition per registered type.
    pub fn new(registry: &ModelRegistry) -> Self {
        Self {
            pool: registry
                .type_tags()
                .map(|type_tag| (type_tag.to_string(), Default::default()))
                .collect(),
            visits: HashMap::new(),
            back_references: 0,
        }
    }

    /// Serialize a whole state mapping into a snapshot.
    pub fn serialize_state(registry: &ModelRegistry, state: &Fields) -> Snapshot {
        let mut serializer = Self::new(registry);
        let state = serializer.serialize_fields(state);
        Snapshot {
            state,
            models: serializer.finish(),
        }
    }

    pub fn serialize_value(&mut self, value: &Value) -> SerialValue {
        match value {
            Value::Null => SerialValue::Null,
            Value::Bool(b) => SerialValue::Bool(*b),
            Value::Number(n) => SerialValue::Number(n.clone()),
            Value::Text(s) => SerialValue::Text(s.clone()),
            Value::List(items) => {
                SerialValue::List(items.iter().map(|item| self.serialize_value(item)).collect())
            }
            Value::Map(fields) => SerialValue::Map(self.serialize_fields(fields)),
            Value::Record(record) => SerialValue::Token(self.serialize_record(record)),
        }
    }

    pub fn serialize_fields(&mut self, fields: &Fields) -> SerialFields {
        fields
            .iter()
            .map(|(key, value)| (key.clone(), self.serialize_value(value)))
            .collect()
    }

    fn serialize_record(&mut self, record: &Record) -> Token {
        let key = record.key();
        let token = Token::from(&key);

        match self.visits.get(&key) {
            Some(Visit::InProgress) => {
                trace!(record = %key, "cycle back to record being pooled");
                self.back_references += 1;
                return token;
            }
            Some(Visit::Done) => {
                trace!(record = %key, "record already pooled");
                return token;
            }
            None => {}
        }

        self.visits.insert(key.clone(), Visit::InProgress);
        let fields = self.serialize_fields(&record.borrow_state());
        self.pool
            .entry(key.type_tag.clone())
            .or_default()
            .insert(key.id.clone(), fields);
        self.visits.insert(key, Visit::Done);

        token
    }

    /// Number of distinct records pooled so far.
    pub fn pooled_count(&self) -> usize {
        self.visits.len()
    }

    /// Number of references that led back into a record whose fields were
    /// still being walked, i.e. cycle edges.
    pub fn back_references(&self) -> usize {
        self.back_references
    }

    pub fn finish(self) -> Pool {
        self.pool
    }
}
