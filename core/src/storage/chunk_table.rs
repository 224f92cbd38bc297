use std::collections::hash_map::Entry;

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::{
    error::{Result, StoreError},
    hash::ChunkHash,
    index::IndexRecord,
};

/// Physical location of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    pub shard_id: u32,
    pub offset: u64,
    pub length: u32,
}

/// In-memory index from content hash to chunk location, spanning all shards
/// of a store
#[derive(Default, Debug)]
pub struct ChunkTable {
    chunks: FxHashMap<ChunkHash, ChunkLocation>,

    /// Hashes per shard in insertion order
    by_shard: FxHashMap<u32, Vec<ChunkHash>>,
}

impl ChunkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the location of the chunk with the given hash
    pub fn lookup(&self, hash: &ChunkHash) -> Option<ChunkLocation> {
        self.chunks.get(hash).copied()
    }

    pub fn contains(&self, hash: &ChunkHash) -> bool {
        self.chunks.contains_key(hash)
    }

    /// Insert a new chunk. Fails with [`StoreError::AlreadyExists`] if the
    /// hash is already known. Existing entries are never overwritten.
    pub fn insert(
        &mut self,
        hash: ChunkHash,
        shard_id: u32,
        offset: u64,
        length: u32,
    ) -> Result<()> {
        match self.chunks.entry(hash) {
            Entry::Occupied(e) => Err(StoreError::AlreadyExists {
                hash,
                shard_id: e.get().shard_id,
            }),
            Entry::Vacant(e) => {
                e.insert(ChunkLocation {
                    shard_id,
                    offset,
                    length,
                });
                self.by_shard.entry(shard_id).or_default().push(hash);
                Ok(())
            }
        }
    }

    /// All records belonging to the given shard, ordered by offset
    pub fn records_for_shard(&self, shard_id: u32) -> Vec<IndexRecord> {
        let Some(hashes) = self.by_shard.get(&shard_id) else {
            return Vec::new();
        };

        hashes
            .iter()
            .map(|h| {
                let loc = self.chunks[h];
                IndexRecord::new(*h, loc.offset, loc.length)
            })
            .sorted_by_key(IndexRecord::sort_key)
            .collect()
    }

    /// Number of chunks stored in the given shard
    pub fn shard_len(&self, shard_id: u32) -> usize {
        self.by_shard.get(&shard_id).map_or(0, Vec::len)
    }

    /// Total number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterate over all chunks in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&ChunkHash, &ChunkLocation)> {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, BooleanAssertion, EqualityAssertion, OptionAssertion, VecAssertion};

    use crate::{error::StoreError, hash::ChunkHash, index::IndexRecord};

    use super::{ChunkLocation, ChunkTable};

    fn hash(b: u8) -> ChunkHash {
        ChunkHash([b; 20])
    }

    #[test]
    fn insert_and_lookup() {
        let mut table = ChunkTable::new();
        assert_that!(table.lookup(&hash(1))).is_none();

        table.insert(hash(1), 1, 0, 10).unwrap();
        table.insert(hash(2), 2, 0, 5).unwrap();

        assert_that!(table.lookup(&hash(1))).is_equal_to(Some(ChunkLocation {
            shard_id: 1,
            offset: 0,
            length: 10,
        }));
        assert_that!(table.contains(&hash(2))).is_true();
        assert_that!(table.len()).is_equal_to(2);
    }

    /// A second insert of the same hash must fail and leave the first entry
    /// untouched
    #[test]
    fn duplicate_insert() {
        let mut table = ChunkTable::new();
        table.insert(hash(1), 1, 0, 10).unwrap();

        let err = table.insert(hash(1), 2, 40, 3).unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyExists { shard_id: 1, .. }
        ));

        assert_that!(table.lookup(&hash(1)).unwrap().shard_id).is_equal_to(1);
        assert_that!(table.len()).is_equal_to(1);
        assert_that!(table.shard_len(2)).is_equal_to(0);
    }

    #[test]
    fn records_for_shard() {
        let mut table = ChunkTable::new();
        table.insert(hash(3), 1, 20, 4).unwrap();
        table.insert(hash(1), 1, 0, 10).unwrap();
        table.insert(hash(9), 2, 0, 7).unwrap();
        table.insert(hash(2), 1, 10, 10).unwrap();

        assert_that!(table.records_for_shard(1)).is_equal_to(vec![
            IndexRecord::new(hash(1), 0, 10),
            IndexRecord::new(hash(2), 10, 10),
            IndexRecord::new(hash(3), 20, 4),
        ]);
        assert_that!(table.records_for_shard(2)).has_length(1);
        assert_that!(table.records_for_shard(3)).is_empty();
    }
}
