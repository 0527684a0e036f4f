//! Collection/item model layered on the append-only store.
//!
//! An [`Item`] is a keyed record: arbitrarily nested `data` plus an
//! optional embedding vector. The vector travels inside the serialized
//! record under the reserved top-level `"vector"` key, so the log's
//! array-replace merge rule gives whole-vector replacement for free.
//!
//! Operations take the owning [`Collection`] explicitly; items never hold
//! a back-pointer to it.

use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::merge::merge_into;
use crate::similarity::VectorError;
use crate::storage::Storage;
use crate::store::{AppendStore, LogStats};

/// Reserved key carrying the embedding inside a serialized record.
pub const VECTOR_KEY: &str = "vector";

/// A keyed record owned by a [`Collection`].
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub key: String,
    /// Nested mapping of scalar/array/mapping values.
    pub data: Value,
    /// Embedding, present only once the item has been embedded.
    pub vector: Option<Vec<f32>>,
}

impl Item {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: Value::Object(Map::new()),
            vector: None,
        }
    }

    pub fn with_data(key: impl Into<String>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
            vector: None,
        }
    }

    /// Apply a merge patch to this item's data.
    pub fn merge_data(&mut self, patch: Value) {
        merge_into(&mut self.data, patch);
    }

    /// Rebuild an item from a stored record value, splitting the embedding
    /// out of the reserved key.
    pub(crate) fn from_value(key: &str, mut value: Value) -> Self {
        let vector = match &mut value {
            Value::Object(map) => map.remove(VECTOR_KEY).and_then(|v| vector_from_value(&v)),
            _ => None,
        };
        Self {
            key: key.to_string(),
            data: value,
            vector,
        }
    }

    /// Serialize to the record value written to the log.
    pub(crate) fn to_value(&self) -> Value {
        let mut value = self.data.clone();
        if let (Value::Object(map), Some(vector)) = (&mut value, &self.vector) {
            map.insert(VECTOR_KEY.to_string(), vector_to_value(vector));
        }
        value
    }
}

/// Decode a JSON array of numbers into an embedding. Anything else — or an
/// array with a non-numeric element — yields `None`.
pub(crate) fn vector_from_value(value: &Value) -> Option<Vec<f32>> {
    let array = value.as_array()?;
    let mut out = Vec::with_capacity(array.len());
    for element in array {
        out.push(element.as_f64()? as f32);
    }
    Some(out)
}

pub(crate) fn vector_to_value(vector: &[f32]) -> Value {
    Value::Array(vector.iter().map(|&x| Value::from(f64::from(x))).collect())
}

/// In-memory map of key → item, persisted through an [`AppendStore`].
///
/// Invariants: keys are unique, and every present vector shares the same
/// dimensionality.
pub struct Collection<S: Storage> {
    store: AppendStore<S>,
    dirty: HashSet<String>,
    dimensions: Option<usize>,
}

impl<S: Storage> Collection<S> {
    pub fn new(store: AppendStore<S>) -> Self {
        Self {
            store,
            dirty: HashSet::new(),
            dimensions: None,
        }
    }

    /// Open a collection over a storage backend and log path.
    pub fn open(storage: S, path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self::new(AppendStore::new(storage, path, debounce))
    }

    /// Replay the log and rebuild in-memory state.
    pub fn load(&mut self) -> Result<()> {
        self.store.load()?;
        self.dirty.clear();
        self.dimensions = None;
        for (key, value) in self.store.iter() {
            if let Value::Object(map) = value {
                if let Some(vector) = map.get(VECTOR_KEY).and_then(vector_from_value) {
                    match self.dimensions {
                        None => self.dimensions = Some(vector.len()),
                        Some(expected) if expected != vector.len() => {
                            tracing::warn!(
                                key,
                                expected,
                                got = vector.len(),
                                "vector dimensionality mismatch in log"
                            );
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Item> {
        self.store
            .get(key)
            .map(|value| Item::from_value(key, value.clone()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Enumerate items lazily, in insertion order. Order is not
    /// semantically significant to consumers.
    pub fn iter(&self) -> impl Iterator<Item = Item> + '_ {
        self.store
            .iter()
            .map(|(key, value)| Item::from_value(key, value.clone()))
    }

    /// Enumerate `(key, vector)` for items that have an embedding, without
    /// materializing full items.
    pub fn iter_vectors(&self) -> impl Iterator<Item = (&str, Vec<f32>)> {
        self.store.iter().filter_map(|(key, value)| {
            let vector = value.as_object()?.get(VECTOR_KEY)?;
            Some((key, vector_from_value(vector)?))
        })
    }

    /// Insert or replace an item in memory and mark it dirty. Does not
    /// touch durable storage until a save is queued.
    pub fn set(&mut self, item: Item) -> Result<(), VectorError> {
        if let Some(vector) = &item.vector {
            match self.dimensions {
                None => self.dimensions = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(VectorError::DimensionMismatch {
                        expected,
                        got: vector.len(),
                    });
                }
                Some(_) => {}
            }
        }
        let key = item.key.clone();
        self.store.insert(key.clone(), item.to_value());
        self.dirty.insert(key);
        Ok(())
    }

    /// Attach (or replace) an item's embedding.
    pub fn set_vector(&mut self, key: &str, vector: Vec<f32>) -> Result<()> {
        let mut item = self
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("item not found: {key}"))?;
        item.vector = Some(vector);
        self.set(item)?;
        Ok(())
    }

    /// Create, register, and return an empty item under `key`.
    pub fn new_item(&mut self, key: impl Into<String>) -> Item {
        let item = Item::new(key);
        // An empty item has no vector, so set cannot fail.
        let _ = self.set(item.clone());
        item
    }

    /// Schedule the item's current serialized value as a merge patch.
    /// Returns `false` for an unknown key.
    pub fn queue_save(&mut self, key: &str, now: Instant) -> bool {
        match self.store.get(key).cloned() {
            Some(value) => {
                self.store.queue_write(key, Some(value), now);
                self.dirty.remove(key);
                true
            }
            None => false,
        }
    }

    /// Queue a save for every dirty item, in no particular order.
    pub fn queue_save_dirty(&mut self, now: Instant) -> usize {
        let keys: Vec<String> = self.dirty.iter().cloned().collect();
        let mut queued = 0;
        for key in keys {
            if self.queue_save(&key, now) {
                queued += 1;
            }
        }
        queued
    }

    /// Remove the item from memory and schedule a tombstone record.
    pub fn delete(&mut self, key: &str, now: Instant) -> bool {
        self.dirty.remove(key);
        if !self.store.contains_key(key) {
            return false;
        }
        self.store.queue_write(key, None, now);
        true
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Dimensionality shared by all present vectors, once one exists.
    pub fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    pub fn flush_due(&self, now: Instant) -> bool {
        self.store.flush_due(now)
    }

    pub fn maybe_flush(&mut self, now: Instant) -> Result<bool> {
        self.store.maybe_flush(now)
    }

    pub fn flush(&mut self, now: Instant) -> Result<bool> {
        self.store.flush(now)
    }

    pub fn log_stats(&self) -> Result<LogStats> {
        self.store.log_stats()
    }

    pub fn store(&self) -> &AppendStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AppendStore<S> {
        &mut self.store
    }
}
