//! CLI `inspect` command — display a single item in full.

use anyhow::{bail, Result};

use strata::config::StrataConfig;

pub fn run(config: &StrataConfig, key: &str) -> Result<()> {
    let collection = super::open_collection(config)?;

    let Some(item) = collection.get(key) else {
        bail!("item not found: {key}");
    };

    println!("Item: {}", item.key);
    println!("{}", "=".repeat(50));
    match &item.vector {
        Some(vector) => println!("  Embedding:  {} dimensions", vector.len()),
        None => println!("  Embedding:  none"),
    }
    println!();
    println!("Data:");
    println!("{}", serde_json::to_string_pretty(&item.data)?);

    Ok(())
}
