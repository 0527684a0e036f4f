//! CLI `related` command — rank items related to a source item by
//! embedding similarity, with the adaptive cutoff applied by default.

use anyhow::{bail, Result};

use strata::config::StrataConfig;
use strata::similarity::{nearest_to_item, trim_by_deviation, NearestParams};

pub fn run(
    config: &StrataConfig,
    key: &str,
    limit: Option<usize>,
    no_trim: bool,
) -> Result<()> {
    let collection = super::open_collection(config)?;

    let params = NearestParams {
        limit: limit.unwrap_or(config.similarity.default_limit),
        ..NearestParams::default()
    };

    let Some(ranked) = nearest_to_item(key, &collection, &params)? else {
        bail!("item not found or not yet embedded: {key}");
    };

    let results = if no_trim || !config.similarity.trim_by_deviation {
        ranked
    } else {
        trim_by_deviation(&ranked)
    };

    if results.is_empty() {
        println!("no related items");
        return Ok(());
    }

    println!("Related to {key}:");
    for connection in &results {
        println!("  {:>7.4}  {}", connection.score, connection.key);
    }

    Ok(())
}
