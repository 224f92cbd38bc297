use crate::index::DEFAULT_MAX_SHARD_SIZE;

/// Options for opening a [`ChunkStore`](super::chunk_store::ChunkStore).
///
/// `depot_id` and `encrypted` are only required when no shard exists on
/// disk yet. Otherwise they are read from the existing index files and, if
/// given, must match them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub depot_id: Option<u32>,
    pub encrypted: Option<bool>,
    pub max_shard_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            depot_id: None,
            encrypted: None,
            max_shard_size: DEFAULT_MAX_SHARD_SIZE,
        }
    }
}

impl StoreConfig {
    /// Configuration for a new store of the given depot
    pub fn new(depot_id: u32, encrypted: bool) -> Self {
        Self::default()
            .with_depot(depot_id)
            .with_encrypted(encrypted)
    }

    pub fn with_depot(mut self, depot_id: u32) -> Self {
        self.depot_id = Some(depot_id);
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = Some(encrypted);
        self
    }

    pub fn with_max_shard_size(mut self, max_shard_size: u64) -> Self {
        self.max_shard_size = max_shard_size;
        self
    }
}
