pub mod chunk_store;
pub mod chunk_table;
pub mod config;
pub mod discovery;
pub mod rollover;
pub mod shard;

use crate::{error::Result, hash::ChunkHash};

/// A store for chunks addressed by their content hash
pub trait Store {
    /// Add a chunk with the given hash to the store. Depending on the actual
    /// implementation, the chunk might not be persisted completely until
    /// [`commit`](Store::commit) is called.
    fn add(&mut self, hash: ChunkHash, chunk: &[u8]) -> Result<()>;

    /// Call this method after adding one or more chunks via
    /// [`add`](Store::add)
    fn commit(&mut self) -> Result<()>;

    /// Retrieve a chunk by hash from the store
    fn get(&self, hash: &ChunkHash) -> Result<Vec<u8>>;
}
