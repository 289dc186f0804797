use std::collections::BTreeMap;

use crate::error::{StoreError, StoreResult};
use crate::value::{Fields, Value};

/// Partial entity fields grouped by partition, then id. Consumed by one merge.
#[derive(Clone, Debug, Default)]
pub struct EntityPayload {
    partitions: BTreeMap<String, BTreeMap<String, Fields>>,
}

impl EntityPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add fields for one entity. Fields for an id given twice are combined,
    /// later values winning.
    pub fn insert(&mut self, partition: impl Into<String>, id: impl Into<String>, fields: Fields) {
        self.partitions
            .entry(partition.into())
            .or_default()
            .entry(id.into())
            .or_default()
            .extend(fields);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, partition: impl Into<String>, id: impl Into<String>, fields: Fields) -> Self {
        self.insert(partition, id, fields);
        self
    }

    /// Read `{"<partition>": {"<id>": {<field>: <value>}}}` plain data.
    pub fn from_json(json: serde_json::Value) -> StoreResult<Self> {
        let serde_json::Value::Object(partitions) = json else {
            return Err(StoreError::MalformedPayload(
                "payload must be an object of partitions".into(),
            ));
        };

        let mut payload = Self::new();
        for (partition, entities) in partitions {
            let serde_json::Value::Object(entities) = entities else {
                return Err(StoreError::MalformedPayload(format!(
                    "partition {} must be an object of entities",
                    partition
                )));
            };
            for (id, fields) in entities {
                let Value::Map(fields) = Value::from_json(fields) else {
                    return Err(StoreError::MalformedPayload(format!(
                        "entity {}:{} must be an object of fields",
                        partition, id
                    )));
                };
                payload.insert(partition.clone(), id, fields);
            }
        }
        Ok(payload)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &str> {
        self.partitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_partitions(self) -> impl Iterator<Item = (String, BTreeMap<String, Fields>)> {
        self.partitions.into_iter()
    }
}
