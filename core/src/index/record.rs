use crate::hash::ChunkHash;

/// One entry of a shard's index: where a chunk lives in the shard's data
/// file
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct IndexRecord {
    /// The chunk's content hash
    pub hash: ChunkHash,

    /// Byte offset of the chunk in the data file
    pub offset: u64,

    /// Length of the chunk in bytes
    pub length: u32,
}

impl IndexRecord {
    pub fn new(hash: ChunkHash, offset: u64, length: u32) -> Self {
        Self {
            hash,
            offset,
            length,
        }
    }

    /// Offset of the first byte after the chunk, [`None`] if it does not
    /// fit into a `u64`
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(u64::from(self.length))
    }

    /// Sort key giving a total order over records: by offset, then length,
    /// then hash. Zero-length chunks may share an offset.
    pub(crate) fn sort_key(&self) -> (u64, u32, ChunkHash) {
        (self.offset, self.length, self.hash)
    }
}
