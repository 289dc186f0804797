//! Entity merging - folding normalized entity payloads into live partitions.
//!
//! Payloads arrive grouped by partition then id, typically from a fetch
//! result that has already been normalized. Merging never replaces a live
//! record: an existing `(partition, id)` is updated in place through
//! [`Record::set_state`](crate::Record::set_state), so every holder of a
//! reference to it sees the new fields.

mod payload;

pub use payload::EntityPayload;

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::record::RecordRef;
use crate::registry::{instantiate, EntityDefinitions};
use crate::store::Store;
use crate::value::{Fields, Value};

/// Reconciles entity payloads against the current state.
pub struct EntityMerger<'a> {
    definitions: &'a EntityDefinitions,
    owner: Option<&'a Store>,
}

impl<'a> EntityMerger<'a> {
    pub fn new(definitions: &'a EntityDefinitions) -> Self {
        Self {
            definitions,
            owner: None,
        }
    }

    /// Records created by this merger get a back-reference to `store`.
    pub fn owned_by(mut self, store: &'a Store) -> Self {
        self.owner = Some(store);
        self
    }

    /// Merge `payload` against `current` and return the touched partitions.
    ///
    /// Each returned partition is a copy of the current one with the payload's
    /// ids merged in; ids not named by the payload are carried over unchanged.
    /// Nothing is notified here. A failure leaves earlier updates applied.
    pub fn merge(&self, payload: EntityPayload, current: &Fields) -> StoreResult<Fields> {
        let mut partitions = Fields::new();
        for (partition, entities) in payload.into_partitions() {
            let merged = self.merge_partition(&partition, entities, current.get(&partition))?;
            partitions.insert(partition, Value::Map(merged));
        }
        Ok(partitions)
    }

    fn merge_partition(
        &self,
        partition: &str,
        entities: BTreeMap<String, Fields>,
        current: Option<&Value>,
    ) -> StoreResult<Fields> {
        let mut merged = current.and_then(Value::as_map).cloned().unwrap_or_default();
        let (mut updated, mut created) = (0usize, 0usize);

        for (id, partial) in entities {
            let record = match live_record(&merged, &id) {
                Some(record) => {
                    record.set_state(partial);
                    updated += 1;
                    record
                }
                None => {
                    let record = self.create(partition, &id, partial)?;
                    created += 1;
                    record
                }
            };
            merged.insert(id, Value::Record(record));
        }

        debug!(partition, updated, created, "merged entities");
        Ok(merged)
    }

    fn create(&self, partition: &str, id: &str, seed: Fields) -> StoreResult<RecordRef> {
        let factory = self
            .definitions
            .get(partition)
            .ok_or_else(|| StoreError::UnknownEntityDefinition(partition.to_string()))?;
        instantiate(factory.as_ref(), id, seed, self.owner)
    }
}

fn live_record(partition: &Fields, id: &str) -> Option<RecordRef> {
    partition.get(id).and_then(Value::as_record).cloned()
}
