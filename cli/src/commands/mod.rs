pub mod get;
pub mod hash_error;
pub mod info;
pub mod list;

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use chunkstore_core::{ChunkStore, StoreConfig};
use humantime::format_duration;
use tracing::debug;

/// Open an existing store for reading
pub(crate) fn open_store(base: &Path) -> Result<ChunkStore> {
    debug!(base = %base.display(), "opening chunk store");
    ChunkStore::open(base, StoreConfig::default())
        .with_context(|| format!("Unable to open chunk store `{}'", base.display()))
}

/// Format an elapsed time with millisecond precision
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    format_duration(Duration::from_millis(elapsed.as_millis() as u64)).to_string()
}
