//! Connections cache — memoizes nearest-neighbor result sets per
//! (source item, query-parameter fingerprint).
//!
//! The cache is process-wide per collection instance and never expires on
//! its own; callers invalidate when underlying vectors change.

use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use super::{Connection, NearestParams, VectorError};

/// Cache key: the source item plus a stable hash of the effective query
/// parameters. The query vector is implicit per source item and excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    source_key: String,
    params_hash: u64,
}

impl Fingerprint {
    pub fn new(source_key: &str, params: &NearestParams) -> Self {
        let mut hasher = DefaultHasher::new();
        params.hash(&mut hasher);
        Self {
            source_key: source_key.to_string(),
            params_hash: hasher.finish(),
        }
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }
}

/// Memoized connection result sets.
#[derive(Debug, Default)]
pub struct ConnectionsCache {
    entries: HashMap<Fingerprint, Vec<Connection>>,
}

impl ConnectionsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&[Connection]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Return the cached result set, computing it at most once per
    /// fingerprint until invalidated.
    pub fn get_or_compute<F>(
        &mut self,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<&[Connection], VectorError>
    where
        F: FnOnce() -> Result<Vec<Connection>, VectorError>,
    {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_slice()),
            Entry::Vacant(entry) => Ok(entry.insert(compute()?).as_slice()),
        }
    }

    /// Drop every cached result set for a source item.
    pub fn invalidate(&mut self, source_key: &str) {
        self.entries
            .retain(|fingerprint, _| fingerprint.source_key != source_key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
