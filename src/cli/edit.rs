//! CLI `set` and `delete` commands — merge a patch into an item or
//! tombstone it, then flush so the change is durable before exit.

use anyhow::{bail, Context, Result};
use std::time::Instant;

use strata::collection::Item;
use strata::config::StrataConfig;

pub fn set(config: &StrataConfig, key: &str, data: &str) -> Result<()> {
    let patch: serde_json::Value =
        serde_json::from_str(data).context("patch is not valid JSON")?;
    if !patch.is_object() {
        bail!("patch must be a JSON object");
    }

    let mut collection = super::open_collection(config)?;
    let now = Instant::now();

    let mut item = collection
        .get(key)
        .unwrap_or_else(|| Item::new(key.to_string()));
    item.merge_data(patch);
    collection.set(item)?;
    collection.queue_save(key, now);
    collection.flush(now)?;

    println!("saved {key}");
    Ok(())
}

pub fn delete(config: &StrataConfig, key: &str) -> Result<()> {
    let mut collection = super::open_collection(config)?;
    let now = Instant::now();

    if !collection.delete(key, now) {
        bail!("item not found: {key}");
    }
    collection.flush(now)?;

    println!("deleted {key}");
    Ok(())
}
