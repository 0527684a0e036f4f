//! Flush-path behavior: debounce coalescing, compaction, and durability
//! across reload.

mod helpers;

use std::time::Instant;

use helpers::{embedded_item, log_path, temp_collection};
use serde_json::json;
use strata::collection::Item;

#[test]
fn burst_of_writes_coalesces_into_one_flush() {
    let start = Instant::now();
    let (tmp, mut collection) = temp_collection();

    for n in 0..20 {
        let mut item = collection
            .get("a")
            .unwrap_or_else(|| Item::new("a"));
        item.merge_data(json!({"n": n}));
        collection.set(item).unwrap();
        collection.queue_save("a", start);
    }

    // Nothing durable inside the debounce window.
    assert!(!collection.flush_due(start));
    assert_eq!(std::fs::read_to_string(log_path(&tmp)).unwrap(), "");

    // One flush once the window elapses; last write wins.
    assert!(collection.maybe_flush(start + helpers::DEBOUNCE).unwrap());
    let stats = collection.log_stats().unwrap();
    assert_eq!(stats.log_records, 1);

    collection.load().unwrap();
    assert_eq!(collection.get("a").unwrap().data, json!({"n": 19}));
}

#[test]
fn flush_compacts_superseded_records() {
    let now = Instant::now();
    let (tmp, mut collection) = temp_collection();

    // Build a dirty log by hand: many records, few live keys.
    let mut raw = String::new();
    for n in 0..10 {
        raw.push_str(&format!("\"a\": {{\"n\": {n}}},\n"));
    }
    raw.push_str("\"b\": {\"n\": 100},\n");
    std::fs::write(log_path(&tmp), raw).unwrap();

    collection.load().unwrap();
    let before = collection.log_stats().unwrap();
    assert_eq!(before.log_records, 11);
    assert_eq!(before.live_keys, 2);

    collection.flush(now).unwrap();
    let after = collection.log_stats().unwrap();
    assert_eq!(after.log_records, 2);
    assert_eq!(after.live_keys, 2);

    // Compaction preserved state exactly.
    collection.load().unwrap();
    assert_eq!(collection.get("a").unwrap().data, json!({"n": 9}));
    assert_eq!(collection.get("b").unwrap().data, json!({"n": 100}));
}

#[test]
fn flush_reflects_latest_state_not_a_stale_snapshot() {
    let now = Instant::now();
    let (_tmp, mut collection) = temp_collection();

    collection.set(Item::with_data("a", json!({"v": "old"}))).unwrap();
    collection.queue_save("a", now);
    // Mutate again before the flush fires.
    collection.set(Item::with_data("a", json!({"v": "new"}))).unwrap();
    collection.queue_save("a", now);

    collection.maybe_flush(now + helpers::DEBOUNCE).unwrap();
    collection.load().unwrap();
    assert_eq!(collection.get("a").unwrap().data, json!({"v": "new"}));
}

#[test]
fn deleted_items_do_not_reappear_after_compaction() {
    let now = Instant::now();
    let (_tmp, mut collection) = temp_collection();

    collection.set(Item::with_data("a", json!({"n": 1}))).unwrap();
    collection.set(Item::with_data("b", json!({"n": 2}))).unwrap();
    collection.queue_save("a", now);
    collection.queue_save("b", now);
    collection.flush(now).unwrap();

    collection.delete("a", now);
    collection.flush(now).unwrap();

    collection.load().unwrap();
    assert!(collection.get("a").is_none());
    assert_eq!(collection.len(), 1);
}

#[test]
fn trailing_appends_after_snapshot_replay_on_load() {
    let now = Instant::now();
    let (tmp, mut collection) = temp_collection();

    collection
        .set(Item::with_data("a", json!({"n": 1, "keep": true})))
        .unwrap();
    collection.queue_save("a", now);
    collection.flush(now).unwrap();

    // Records appended after the snapshot, as a collaborator with
    // immediate-durability needs would leave them.
    collection
        .store_mut()
        .append_record("a", Some(json!({"n": 2})))
        .unwrap();
    collection
        .store_mut()
        .append_record("b", Some(json!({"n": 3})))
        .unwrap();

    let raw = std::fs::read_to_string(log_path(&tmp)).unwrap();
    assert_eq!(raw.lines().count(), 3);

    collection.load().unwrap();
    assert_eq!(
        collection.get("a").unwrap().data,
        json!({"n": 2, "keep": true})
    );
    assert_eq!(collection.get("b").unwrap().data, json!({"n": 3}));
}

#[test]
fn embedded_items_round_trip_through_flush() {
    let now = Instant::now();
    let (_tmp, mut collection) = temp_collection();

    for (i, key) in ["a", "b", "c"].iter().enumerate() {
        collection.set(embedded_item(key, i, 8)).unwrap();
        collection.queue_save(key, now);
    }
    collection.flush(now).unwrap();

    collection.load().unwrap();
    assert_eq!(collection.dimensions(), Some(8));
    assert_eq!(collection.iter_vectors().count(), 3);
}
