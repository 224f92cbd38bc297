//! A content-addressed chunk store. Chunks are opaque byte sequences keyed
//! by a 20-byte hash and kept in shards of data (`.csd`) and index (`.csm`)
//! files. See [`storage::chunk_store::ChunkStore`].

pub mod error;
pub mod hash;
pub mod index;
pub mod storage;

pub use error::{Result, StoreError};
pub use hash::ChunkHash;
pub use storage::{chunk_store::ChunkStore, config::StoreConfig, Store};
