//! Log-structured item store with embedding similarity search.
//!
//! Strata persists a collection of keyed items as a single append-only log
//! of merge records and answers "what is related to this item" queries over
//! the items' embedding vectors. The two halves share one data model: an
//! item is a key, an arbitrarily nested JSON mapping, and an optional
//! embedding.
//!
//! # Architecture
//!
//! - **Storage**: a filesystem capability trait with a directory-backed
//!   implementation; the log compacts to one record per live key on flush
//! - **Merge**: structural deep merge with array-replace and
//!   null-tombstone semantics, replayed in file order on load
//! - **Similarity**: cosine nearest-neighbor ranking with an adaptive
//!   statistical cutoff, memoized per query fingerprint
//! - **Clustering**: centroid and medoid geometry over item vectors
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`storage`] — Filesystem capability trait and directory backend
//! - [`merge`] — Deep merge engine for nested mappings
//! - [`store`] — Append-only log store: replay, debounced flush, compaction
//! - [`collection`] — Keyed item model layered on the store
//! - [`similarity`] — Cosine similarity, nearest-neighbor queries, connections cache
//! - [`cluster`] — Centroid and medoid computation

pub mod cluster;
pub mod collection;
pub mod config;
pub mod merge;
pub mod similarity;
pub mod storage;
pub mod store;
