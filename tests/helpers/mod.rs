#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use strata::collection::{Collection, Item};
use strata::storage::DirStorage;
use tempfile::TempDir;

pub const DEBOUNCE: Duration = Duration::from_millis(100);
pub const LOG_FILE: &str = "items.log";

/// Open a fresh collection over a temp directory. Keep the `TempDir`
/// alive for the duration of the test.
pub fn temp_collection() -> (TempDir, Collection<DirStorage>) {
    let tmp = TempDir::new().unwrap();
    let storage = DirStorage::new(tmp.path()).unwrap();
    let mut collection = Collection::open(storage, LOG_FILE, DEBOUNCE);
    collection.load().unwrap();
    (tmp, collection)
}

/// Absolute path of the log inside the temp directory.
pub fn log_path(tmp: &TempDir) -> PathBuf {
    tmp.path().join(LOG_FILE)
}

/// Deterministic unit vector with a spike at position `seed`. Distinct
/// seeds produce orthogonal vectors.
pub fn spike_vector(seed: usize, dims: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dims];
    v[seed % dims] = 1.0;
    v
}

/// An item with a title and a spike embedding.
pub fn embedded_item(key: &str, seed: usize, dims: usize) -> Item {
    let mut item = Item::with_data(key, serde_json::json!({"title": key}));
    item.vector = Some(spike_vector(seed, dims));
    item
}
