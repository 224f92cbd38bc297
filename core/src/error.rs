use std::{io, path::PathBuf};

use thiserror::Error;

use crate::hash::ChunkHash;

/// Errors reported by the chunk store
#[derive(Error, Debug)]
pub enum StoreError {
    /// An index file has a bad magic or is otherwise malformed
    #[error("malformed index file `{}': {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    /// The store cannot be opened with the given configuration
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// The requested chunk is not in the store
    #[error("chunk {0} not found")]
    NotFound(ChunkHash),

    /// A chunk with the same hash has already been stored
    #[error("chunk {hash} already exists in shard {shard_id}")]
    AlreadyExists { hash: ChunkHash, shard_id: u32 },

    /// The files on disk contradict each other (e.g. an index refers to
    /// bytes its data file does not contain)
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// A chunk is longer than an index record can describe
    #[error("chunk {hash} is {len} bytes long, which exceeds the maximum of {max} bytes")]
    ChunkTooLarge { hash: ChunkHash, len: usize, max: u64 },

    /// The underlying file system operation failed
    #[error("I/O error on `{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Attach a path to a raw [`io::Result`]
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| StoreError::io(path, e))
    }
}
