//! CLI `compact` command — rewrite the log as a single snapshot.

use anyhow::Result;
use std::time::Instant;

use strata::config::StrataConfig;

pub fn run(config: &StrataConfig) -> Result<()> {
    let mut collection = super::open_collection(config)?;

    let before = collection.log_stats()?;
    collection.flush(Instant::now())?;
    let after = collection.log_stats()?;

    println!(
        "compacted: {} records -> {} ({} items)",
        before.log_records, after.log_records, after.live_keys
    );
    Ok(())
}
