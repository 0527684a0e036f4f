pub mod compact;
pub mod edit;
pub mod inspect;
pub mod related;
pub mod stats;

use anyhow::Result;

use strata::collection::Collection;
use strata::config::StrataConfig;
use strata::storage::DirStorage;

/// Open and load the configured collection.
pub fn open_collection(config: &StrataConfig) -> Result<Collection<DirStorage>> {
    let storage = DirStorage::new(config.resolved_storage_dir())?;
    let mut collection = Collection::open(
        storage,
        config.storage.log_file.clone(),
        config.flush_debounce(),
    );
    collection.load()?;
    Ok(collection)
}
