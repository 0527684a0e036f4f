//! Append-only store — durable persistence of a keyed collection as a
//! sequence of merge records.
//!
//! [`AppendStore`] owns the authoritative in-memory map. [`load`] rebuilds
//! it by replaying the log in file order through the merge engine;
//! [`queue_write`] mutates memory and journals the record for a debounced
//! [`flush`], which rewrites the log as a compacted snapshot. Flush is the
//! only operation that shrinks the log.
//!
//! Everything here runs single-threaded and cooperatively: the debounce is
//! an explicit [`FlushScheduler`] with one pending deadline, driven by
//! caller-supplied [`Instant`]s rather than background timers.
//!
//! [`load`]: AppendStore::load
//! [`queue_write`]: AppendStore::queue_write
//! [`flush`]: AppendStore::flush

pub mod log;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use self::log::{encode_record, encode_snapshot, parse_log, LogRecord};
use crate::merge::merge_into;
use crate::storage::Storage;

/// Debounce state for flush coalescing: a single pending deadline with
/// cancel-and-reschedule semantics, plus a flush-in-progress flag that
/// defers (never drops) a flush requested mid-flush.
#[derive(Debug)]
pub struct FlushScheduler {
    debounce: Duration,
    deadline: Option<Instant>,
    in_flight: bool,
    retry_requested: bool,
}

impl FlushScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            deadline: None,
            in_flight: false,
            retry_requested: false,
        }
    }

    /// Cancel any pending deadline and schedule a fresh one. A burst of
    /// calls within the debounce window collapses into one deadline.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.debounce);
    }

    /// True once the pending deadline has been reached.
    pub fn is_due(&self, now: Instant) -> bool {
        !self.in_flight && matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    /// Try to start a flush. Returns `false` when one is already in
    /// progress, in which case a deferred retry is recorded instead.
    fn begin(&mut self) -> bool {
        if self.in_flight {
            self.retry_requested = true;
            return false;
        }
        self.in_flight = true;
        self.deadline = None;
        true
    }

    /// Mark the in-flight flush finished; reschedule if a retry was
    /// requested while it ran.
    fn finish(&mut self, now: Instant) {
        self.in_flight = false;
        if self.retry_requested {
            self.retry_requested = false;
            self.schedule(now);
        }
    }

    pub fn has_pending_deadline(&self) -> bool {
        self.deadline.is_some()
    }
}

/// Counts reported by [`AppendStore::log_stats`].
#[derive(Debug, Serialize)]
pub struct LogStats {
    /// Keys alive in the current in-memory state.
    pub live_keys: usize,
    /// Raw records in the on-disk log (superseded ones included).
    pub log_records: usize,
}

/// Log-structured store for a `key -> Value` collection.
pub struct AppendStore<S: Storage> {
    storage: S,
    path: PathBuf,
    entries: HashMap<String, Value>,
    /// Insertion order of live keys; drives enumeration and snapshots.
    order: Vec<String>,
    pending: Vec<LogRecord>,
    scheduler: FlushScheduler,
}

impl<S: Storage> AppendStore<S> {
    pub fn new(storage: S, path: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            storage,
            path: path.into(),
            entries: HashMap::new(),
            order: Vec::new(),
            pending: Vec::new(),
            scheduler: FlushScheduler::new(debounce),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn log_path(&self) -> &Path {
        &self.path
    }

    /// Rebuild the in-memory map by replaying the log in file order.
    ///
    /// A missing or corrupt log is recoverable: the store starts from an
    /// empty collection and re-creates an empty log in its place.
    pub fn load(&mut self) -> Result<()> {
        self.entries.clear();
        self.order.clear();
        self.pending.clear();

        if !self.storage.exists(&self.path) {
            tracing::info!(path = %self.path.display(), "no log found, starting empty");
            return self.recreate_empty_log();
        }

        let records = self
            .storage
            .read_text(&self.path)
            .and_then(|text| parse_log(&text));
        match records {
            Ok(records) => {
                let count = records.len();
                for record in records {
                    self.apply(record);
                }
                tracing::debug!(
                    records = count,
                    live = self.entries.len(),
                    "log replayed"
                );
                Ok(())
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "unreadable log, starting empty"
                );
                self.entries.clear();
                self.order.clear();
                self.recreate_empty_log()
            }
        }
    }

    fn recreate_empty_log(&mut self) -> Result<()> {
        self.storage
            .write_text(&self.path, "")
            .context("failed to initialize empty log")
    }

    /// Apply one record to the in-memory map (merge semantics; a tombstone
    /// deletes the key outright).
    fn apply(&mut self, record: LogRecord) {
        match record.value {
            None => {
                self.drop_key(&record.key);
            }
            Some(patch) => match self.entries.get_mut(&record.key) {
                Some(existing) => merge_into(existing, patch),
                None => {
                    self.order.push(record.key.clone());
                    self.entries.insert(record.key, patch);
                }
            },
        }
    }

    fn drop_key(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Enumerate live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).map(|value| (key.as_str(), value)))
    }

    /// Replace a key's value in memory without touching the journal.
    /// Used by the collection layer for `set`; persistence happens when the
    /// caller queues a save.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push(key);
        }
    }

    /// Remove a key from memory without writing a tombstone.
    pub fn remove(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.order.retain(|k| k != key);
        }
        existed
    }

    /// Queue one merge record: applied to memory immediately, journaled in
    /// call order, flushed later. `None` is a tombstone.
    pub fn queue_write(&mut self, key: impl Into<String>, patch: Option<Value>, now: Instant) {
        let record = LogRecord {
            key: key.into(),
            value: patch,
        };
        self.apply(record.clone());
        self.pending.push(record);
        self.scheduler.schedule(now);
    }

    /// Immediate-durability path: apply the record and append it to the log
    /// right away. These are the trailing records a compacted snapshot may
    /// carry until the next flush.
    pub fn append_record(&mut self, key: &str, patch: Option<Value>) -> Result<()> {
        let line = encode_record(key, patch.as_ref());
        self.apply(LogRecord {
            key: key.to_string(),
            value: patch,
        });
        self.storage
            .append_text(&self.path, &line)
            .context("failed to append log record")
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True once the debounce window for queued writes has elapsed.
    pub fn flush_due(&self, now: Instant) -> bool {
        self.scheduler.is_due(now)
    }

    /// Flush if the debounce deadline has passed. Returns whether a flush
    /// ran.
    pub fn maybe_flush(&mut self, now: Instant) -> Result<bool> {
        if !self.scheduler.is_due(now) {
            return Ok(false);
        }
        self.flush(now).map(|_| true)
    }

    /// Compact the log: atomically replace it with a snapshot of the
    /// current in-memory state, one record per live key.
    ///
    /// Returns `false` when a flush was already in progress; the request is
    /// deferred via the scheduler rather than dropped. On write failure the
    /// in-memory state stays authoritative and the journal is kept for the
    /// next attempt.
    pub fn flush(&mut self, now: Instant) -> Result<bool> {
        if !self.scheduler.begin() {
            tracing::debug!("flush already in progress, deferring");
            return Ok(false);
        }

        let snapshot = encode_snapshot(self.iter());
        let result = self.storage.write_text(&self.path, &snapshot);
        self.scheduler.finish(now);

        match result {
            Ok(()) => {
                let coalesced = self.pending.len();
                self.pending.clear();
                tracing::debug!(live = self.entries.len(), coalesced, "log compacted");
                Ok(true)
            }
            Err(error) => {
                tracing::warn!(error = %error, "flush failed, state kept in memory");
                Err(error)
            }
        }
    }

    /// Count live keys against raw on-disk records.
    pub fn log_stats(&self) -> Result<LogStats> {
        let log_records = if self.storage.exists(&self.path) {
            let text = self.storage.read_text(&self.path)?;
            parse_log(&text)?.len()
        } else {
            0
        };
        Ok(LogStats {
            live_keys: self.entries.len(),
            log_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(100);

    #[test]
    fn schedule_sets_a_single_deadline() {
        let mut scheduler = FlushScheduler::new(DEBOUNCE);
        let start = Instant::now();

        assert!(!scheduler.is_due(start));
        scheduler.schedule(start);
        assert!(!scheduler.is_due(start));
        assert!(scheduler.is_due(start + DEBOUNCE));
    }

    #[test]
    fn reschedule_cancels_prior_deadline() {
        let mut scheduler = FlushScheduler::new(DEBOUNCE);
        let start = Instant::now();

        scheduler.schedule(start);
        // A later write pushes the deadline out.
        scheduler.schedule(start + Duration::from_millis(50));
        assert!(!scheduler.is_due(start + DEBOUNCE));
        assert!(scheduler.is_due(start + Duration::from_millis(150)));
    }

    #[test]
    fn begin_while_in_flight_defers_and_retries() {
        let mut scheduler = FlushScheduler::new(DEBOUNCE);
        let start = Instant::now();

        assert!(scheduler.begin());
        // Re-entrant request while a flush runs is deferred, not dropped.
        assert!(!scheduler.begin());
        scheduler.finish(start);
        assert!(scheduler.has_pending_deadline());
        assert!(scheduler.is_due(start + DEBOUNCE));
    }

    #[test]
    fn begin_consumes_the_deadline() {
        let mut scheduler = FlushScheduler::new(DEBOUNCE);
        let start = Instant::now();

        scheduler.schedule(start);
        assert!(scheduler.begin());
        scheduler.finish(start + DEBOUNCE);
        assert!(!scheduler.has_pending_deadline());
        assert!(!scheduler.is_due(start + DEBOUNCE * 2));
    }

    mod store {
        use super::*;
        use crate::storage::testing::MemStorage;
        use serde_json::json;
        use std::path::Path;

        fn test_store() -> AppendStore<MemStorage> {
            let mut store = AppendStore::new(MemStorage::new(), "items.log", DEBOUNCE);
            store.load().unwrap();
            store
        }

        #[test]
        fn load_replays_records_in_file_order() {
            let storage = MemStorage::new();
            let path = Path::new("items.log");
            storage
                .write_text(
                    path,
                    "\"a\": {\"n\": 1, \"inner\": {\"x\": true}},\n\
                     \"b\": {\"n\": 2},\n\
                     \"a\": {\"n\": 10, \"inner\": {\"y\": false}},\n",
                )
                .unwrap();

            let mut store = AppendStore::new(storage, path, DEBOUNCE);
            store.load().unwrap();

            assert_eq!(store.len(), 2);
            assert_eq!(
                store.get("a"),
                Some(&json!({"n": 10, "inner": {"x": true, "y": false}}))
            );
        }

        #[test]
        fn load_applies_tombstones() {
            let storage = MemStorage::new();
            let path = Path::new("items.log");
            storage
                .write_text(path, "\"a\": {\"n\": 1},\n\"a\": null,\n")
                .unwrap();

            let mut store = AppendStore::new(storage, path, DEBOUNCE);
            store.load().unwrap();
            assert!(store.is_empty());
        }

        #[test]
        fn missing_log_starts_empty_and_creates_it() {
            let store = test_store();
            assert!(store.is_empty());
            assert_eq!(
                store.storage().contents(Path::new("items.log")).as_deref(),
                Some("")
            );
        }

        #[test]
        fn corrupt_log_recovers_to_empty() {
            let storage = MemStorage::new();
            let path = Path::new("items.log");
            storage.write_text(path, "{{{ not a log\n").unwrap();

            let mut store = AppendStore::new(storage, path, DEBOUNCE);
            store.load().unwrap();
            assert!(store.is_empty());
            assert_eq!(store.storage().contents(path).as_deref(), Some(""));
        }

        #[test]
        fn queued_writes_are_not_durable_until_flush() {
            let now = Instant::now();
            let mut store = test_store();
            store.queue_write("a", Some(json!({"n": 1})), now);

            assert_eq!(store.get("a"), Some(&json!({"n": 1})));
            assert_eq!(
                store.storage().contents(Path::new("items.log")).as_deref(),
                Some("")
            );

            store.flush(now).unwrap();
            let on_disk = store.storage().contents(Path::new("items.log")).unwrap();
            assert_eq!(on_disk, "\"a\": {\"n\":1},\n");
        }

        #[test]
        fn flush_compacts_to_one_record_per_key() {
            let now = Instant::now();
            let mut store = test_store();
            for n in 0..5 {
                store.queue_write("a", Some(json!({"n": n})), now);
            }
            store.queue_write("b", Some(json!({"n": 9})), now);
            assert_eq!(store.pending_len(), 6);

            store.flush(now).unwrap();
            assert_eq!(store.pending_len(), 0);

            let stats = store.log_stats().unwrap();
            assert_eq!(stats.live_keys, 2);
            assert_eq!(stats.log_records, 2);
        }

        #[test]
        fn debounce_coalesces_a_burst_into_one_due_flush() {
            let start = Instant::now();
            let mut store = test_store();
            for i in 0..10 {
                store.queue_write("a", Some(json!({"n": i})), start);
            }

            assert!(!store.flush_due(start));
            assert!(!store.maybe_flush(start).unwrap());
            assert!(store.maybe_flush(start + DEBOUNCE).unwrap());
            // Nothing left pending; a second tick does not flush again.
            assert!(!store.maybe_flush(start + DEBOUNCE * 2).unwrap());
        }

        #[test]
        fn failed_flush_keeps_memory_and_journal() {
            let now = Instant::now();
            let mut store = test_store();
            store.queue_write("a", Some(json!({"n": 1})), now);

            store.storage().fail_writes.set(true);
            assert!(store.flush(now).is_err());
            assert_eq!(store.get("a"), Some(&json!({"n": 1})));
            assert_eq!(store.pending_len(), 1);

            store.storage().fail_writes.set(false);
            store.flush(now).unwrap();
            assert_eq!(store.pending_len(), 0);
        }

        #[test]
        fn append_record_is_immediately_durable() {
            let mut store = test_store();
            store.append_record("a", Some(json!({"n": 1}))).unwrap();
            store.append_record("a", None).unwrap();

            let on_disk = store.storage().contents(Path::new("items.log")).unwrap();
            assert_eq!(on_disk, "\"a\": {\"n\":1},\n\"a\": null,\n");
            assert!(store.is_empty());
        }

        #[test]
        fn snapshot_with_trailing_records_replays_on_load() {
            let now = Instant::now();
            let mut store = test_store();
            store.queue_write("a", Some(json!({"n": 1, "keep": true})), now);
            store.flush(now).unwrap();
            // Trailing records after the snapshot, as left by append_record.
            store.append_record("a", Some(json!({"n": 2}))).unwrap();
            store.append_record("b", Some(json!({"n": 3}))).unwrap();

            store.load().unwrap();
            assert_eq!(store.get("a"), Some(&json!({"n": 2, "keep": true})));
            assert_eq!(store.get("b"), Some(&json!({"n": 3})));
        }
    }
}
