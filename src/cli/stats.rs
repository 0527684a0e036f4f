use anyhow::Result;

use strata::config::StrataConfig;

/// Display collection and log statistics in the terminal.
pub fn run(config: &StrataConfig) -> Result<()> {
    let collection = super::open_collection(config)?;
    let stats = collection.log_stats()?;

    let embedded = collection.iter_vectors().count();

    println!("Collection Statistics");
    println!("{}", "=".repeat(40));
    println!("  Items:               {}", collection.len());
    println!("  With embeddings:     {embedded}");
    if let Some(dimensions) = collection.dimensions() {
        println!("  Vector dimensions:   {dimensions}");
    }
    println!();
    println!("Log:");
    println!("  Live keys:           {}", stats.live_keys);
    println!("  Raw records:         {}", stats.log_records);
    if stats.log_records > stats.live_keys {
        println!(
            "  {} superseded records; run `strata compact` to shrink the log",
            stats.log_records - stats.live_keys
        );
    }

    Ok(())
}
