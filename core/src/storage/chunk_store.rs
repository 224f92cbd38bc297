use std::{
    fmt,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use tracing::{debug, trace, warn};

use crate::{
    error::{Result, StoreError},
    hash::ChunkHash,
    index::{read_index_file, IndexHeader, IndexRecord},
};

use super::{
    chunk_table::{ChunkLocation, ChunkTable},
    config::StoreConfig,
    discovery::{check_contiguous, discover_data_files, discover_shards, normalize_base},
    rollover::RolloverPolicy,
    shard::{Shard, ShardState},
    Store,
};

/// Key figures of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub depot_id: u32,
    pub encrypted: bool,
    pub shard_count: usize,
    pub chunk_count: usize,
}

/// A content-addressed chunk store made of one or more shards, each
/// consisting of a data file (`<base>_<id>.csd`) and an index file
/// (`<base>_<id>.csm`).
///
/// Chunks are appended to the active shard. When a chunk would push the
/// active shard's data file past the maximum shard size, the shard is
/// sealed (its index file is written) and a new shard is started. One
/// [`ChunkTable`] spanning all shards is kept for the lifetime of the store.
///
/// Only a single writer may use a base name at a time. Concurrent writers,
/// in the same or in different processes, corrupt the offset bookkeeping.
/// Readers may run concurrently with each other but not with a writer.
pub struct ChunkStore {
    base: PathBuf,
    depot_id: u32,
    encrypted: bool,
    policy: RolloverPolicy,

    /// All known shards. Shard `n` is at position `n - 1`.
    shards: Vec<Shard>,

    /// Id of the shard receiving appends
    active: u32,

    /// `true` if the active shard holds records its index file does not
    /// list yet
    dirty: bool,

    table: ChunkTable,
}

impl ChunkStore {
    /// Open the store with the given base name. Existing shards are
    /// discovered and loaded. If there are none, `config` must provide the
    /// depot id and the encryption flag.
    pub fn open(base: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let base = normalize_base(base.as_ref());
        let ids = discover_shards(&base)?;
        check_contiguous(&base, &ids)?;

        let store = if ids.is_empty() {
            Self::create(base, config)?
        } else {
            Self::load(base, &ids, config)?
        };

        store.warn_about_stray_data_files()?;

        debug!(
            base = %store.base.display(),
            depot = store.depot_id,
            encrypted = store.encrypted,
            shards = store.shards.len(),
            chunks = store.table.len(),
            "opened chunk store"
        );

        Ok(store)
    }

    fn create(base: PathBuf, config: StoreConfig) -> Result<Self> {
        let (Some(depot_id), Some(encrypted)) = (config.depot_id, config.encrypted) else {
            return Err(StoreError::Config(format!(
                "no shards found at `{}'; depot id and encryption flag must be given to create a new store",
                base.display()
            )));
        };

        let shards = vec![Shard::new(&base, 1)];
        Ok(Self {
            base,
            depot_id,
            encrypted,
            policy: RolloverPolicy::new(config.max_shard_size),
            shards,
            active: 1,
            dirty: false,
            table: ChunkTable::new(),
        })
    }

    fn load(base: PathBuf, ids: &[u32], config: StoreConfig) -> Result<Self> {
        let mut table = ChunkTable::new();
        let mut shards = Vec::with_capacity(ids.len());
        let mut first_header: Option<IndexHeader> = None;

        for &id in ids {
            let shard = Shard::sealed(&base, id);
            let (header, records) = read_index_file(shard.index_path())?;

            if !header.has_known_marker() {
                warn!(
                    shard = id,
                    marker = header.marker,
                    "unknown format marker, treating shard as {}",
                    if header.encrypted { "encrypted" } else { "not encrypted" }
                );
            }

            if let Some(first) = first_header {
                if first.depot_id != header.depot_id || first.encrypted != header.encrypted {
                    return Err(StoreError::Integrity(format!(
                        "shard {id} belongs to depot {} (encrypted: {}), but shard 1 belongs to depot {} (encrypted: {})",
                        header.depot_id, header.encrypted, first.depot_id, first.encrypted
                    )));
                }
            } else {
                first_header = Some(header);
            }

            shard.check_records(&records)?;
            for r in &records {
                table
                    .insert(r.hash, id, r.offset, r.length)
                    .map_err(|e| match e {
                        StoreError::AlreadyExists { hash, shard_id } => StoreError::Integrity(
                            format!("chunk {hash} is listed in shard {shard_id} and again in shard {id}"),
                        ),
                        e => e,
                    })?;
            }

            debug!(shard = id, records = records.len(), "loaded shard");
            shards.push(shard);
        }

        let Some(header) = first_header else {
            return Err(StoreError::Config(format!(
                "no shards found at `{}'",
                base.display()
            )));
        };

        if config.depot_id.is_some_and(|d| d != header.depot_id) {
            return Err(StoreError::Config(format!(
                "store at `{}' belongs to depot {}, not {}",
                base.display(),
                header.depot_id,
                config.depot_id.unwrap_or_default()
            )));
        }
        if config.encrypted.is_some_and(|e| e != header.encrypted) {
            return Err(StoreError::Config(format!(
                "store at `{}' has encrypted = {}, but {} was requested",
                base.display(),
                header.encrypted,
                !header.encrypted
            )));
        }

        let active = shards.len() as u32;
        Ok(Self {
            base,
            depot_id: header.depot_id,
            encrypted: header.encrypted,
            policy: RolloverPolicy::new(config.max_shard_size),
            shards,
            active,
            dirty: false,
            table,
        })
    }

    /// Data files beyond the last index file hold bytes no index refers to
    fn warn_about_stray_data_files(&self) -> Result<()> {
        let known = self.shards.iter().filter(|s| s.index_exists()).count() as u32;
        for id in discover_data_files(&self.base)? {
            if id > known {
                warn!(
                    shard = id,
                    base = %self.base.display(),
                    "data file without index file, its contents are not indexed"
                );
            }
        }
        Ok(())
    }

    fn shard(&self, id: u32) -> Option<&Shard> {
        self.shards.get((id as usize).checked_sub(1)?)
    }

    fn shard_mut(&mut self, id: u32) -> Option<&mut Shard> {
        self.shards.get_mut((id as usize).checked_sub(1)?)
    }

    fn active_shard(&self) -> &Shard {
        &self.shards[self.active as usize - 1]
    }

    fn header(&self) -> IndexHeader {
        IndexHeader::new(self.depot_id, self.encrypted)
    }

    /// Append a chunk and return the shard id and offset it was written to.
    /// Fails with [`StoreError::AlreadyExists`] if a chunk with the same hash
    /// has been stored before. The hash is not checked against `data`.
    pub fn append(&mut self, hash: ChunkHash, data: &[u8]) -> Result<(u32, u64)> {
        if let Some(loc) = self.table.lookup(&hash) {
            return Err(StoreError::AlreadyExists {
                hash,
                shard_id: loc.shard_id,
            });
        }

        let length = u32::try_from(data.len()).map_err(|_| StoreError::ChunkTooLarge {
            hash,
            len: data.len(),
            max: u64::from(u32::MAX),
        })?;

        let size = self.active_shard().data_len()?;
        if self.policy.should_roll(size, u64::from(length)) {
            self.roll_over()?;
        }

        let active = self.active;
        let offset = self.shards[active as usize - 1].append(data)?;
        self.table.insert(hash, active, offset, length)?;
        self.dirty = true;

        trace!(%hash, shard = active, offset, length, "appended chunk");

        Ok((active, offset))
    }

    /// Seal the active shard and continue with the next one
    fn roll_over(&mut self) -> Result<()> {
        let previous = self.active;
        self.seal_if_needed(previous)?;

        let next = previous + 1;
        if self.shard(next).is_none() {
            self.shards.push(Shard::new(&self.base, next));
        }
        self.active = next;

        debug!(from = previous, to = next, "rolled over to new shard");
        Ok(())
    }

    /// Seal a shard that is about to stop being the active one. Besides
    /// unsealed records, a data file without an index file also needs an
    /// index so shard ids stay contiguous on disk.
    fn seal_if_needed(&mut self, id: u32) -> Result<()> {
        let Some(shard) = self.shard(id) else {
            return Ok(());
        };
        let needs_index = !shard.index_exists() && shard.data_len()? > 0;
        if (id == self.active && self.dirty) || needs_index {
            self.seal(id)?;
        }
        Ok(())
    }

    /// Read the chunk with the given hash
    pub fn read(&self, hash: &ChunkHash) -> Result<Vec<u8>> {
        let loc = self
            .table
            .lookup(hash)
            .ok_or(StoreError::NotFound(*hash))?;
        let shard = self.shard(loc.shard_id).ok_or_else(|| {
            StoreError::Integrity(format!(
                "chunk {hash} refers to unknown shard {}",
                loc.shard_id
            ))
        })?;
        shard.read_at(loc.offset, loc.length)
    }

    /// Look up where a chunk is stored without reading it
    pub fn locate(&self, hash: &ChunkHash) -> Option<ChunkLocation> {
        self.table.lookup(hash)
    }

    pub fn contains(&self, hash: &ChunkHash) -> bool {
        self.table.contains(hash)
    }

    /// Write the index file of the given shard. Sealing a shard twice
    /// without appending in between produces identical files. A shard that
    /// has neither records, data nor an index file is left alone.
    pub fn seal(&mut self, shard_id: u32) -> Result<()> {
        let header = self.header();
        let records = self.table.records_for_shard(shard_id);

        let shard = self
            .shard(shard_id)
            .ok_or_else(|| StoreError::Config(format!("shard {shard_id} does not exist")))?;
        if records.is_empty() && !shard.index_exists() && shard.data_len()? == 0 {
            return Ok(());
        }

        if let Some(shard) = self.shard_mut(shard_id) {
            shard.seal(&header, &records)?;
        }

        if shard_id == self.active {
            self.dirty = false;
        }
        Ok(())
    }

    /// Seal the active shard if it holds unsealed records
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.seal(self.active)?;
        }
        Ok(())
    }

    /// Flush and close the store
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    /// Make `shard_id` the active shard, e.g. to add chunks to an older
    /// shard. The current active shard is sealed first. If the selected
    /// shard has an index file, its records are reconciled with the chunk
    /// table before any write can happen. A new shard may only be selected
    /// directly after the last shard on disk.
    pub fn select_shard(&mut self, shard_id: u32) -> Result<()> {
        if shard_id == self.active {
            return Ok(());
        }
        if shard_id == 0 || shard_id as usize > self.shards.len() + 1 {
            return Err(StoreError::Config(format!(
                "cannot select shard {shard_id}, the store has {} shards",
                self.shards.len()
            )));
        }

        self.seal_if_needed(self.active)?;

        if self.shard(shard_id).is_none() {
            let last_on_disk = self.shards.last().map_or(true, Shard::index_exists);
            if !last_on_disk {
                return Err(StoreError::Config(format!(
                    "cannot select shard {shard_id} before shard {} has been written",
                    self.shards.len()
                )));
            }
            self.shards.push(Shard::new(&self.base, shard_id));
            self.active = shard_id;
            self.dirty = false;
        } else {
            let dirty = self.reconcile(shard_id)?;
            self.active = shard_id;
            self.dirty = dirty;
        }

        debug!(shard = shard_id, "selected shard");
        Ok(())
    }

    /// Bring the chunk table in line with the shard's index file on disk.
    /// Returns `true` if the table knows records the index file does not
    /// list.
    fn reconcile(&mut self, shard_id: u32) -> Result<bool> {
        let Some(shard) = self.shard(shard_id) else {
            return Ok(false);
        };
        if !shard.index_exists() {
            return Ok(self.table.shard_len(shard_id) > 0);
        }

        let (header, records) = read_index_file(shard.index_path())?;
        if header.depot_id != self.depot_id || header.encrypted != self.encrypted {
            return Err(StoreError::Integrity(format!(
                "shard {shard_id} belongs to depot {} (encrypted: {}), but the store belongs to depot {} (encrypted: {})",
                header.depot_id, header.encrypted, self.depot_id, self.encrypted
            )));
        }
        shard.check_records(&records)?;

        for r in &records {
            match self.table.lookup(&r.hash) {
                None => self.table.insert(r.hash, shard_id, r.offset, r.length)?,
                Some(loc)
                    if loc.shard_id == shard_id
                        && loc.offset == r.offset
                        && loc.length == r.length => {}
                Some(loc) => {
                    return Err(StoreError::Integrity(format!(
                        "index of shard {shard_id} lists chunk {} at {}+{}, but it is stored in shard {} at {}+{}",
                        r.hash, r.offset, r.length, loc.shard_id, loc.offset, loc.length
                    )));
                }
            }
        }

        Ok(self.table.shard_len(shard_id) > records.len())
    }

    pub fn base_name(&self) -> &Path {
        &self.base
    }

    pub fn depot_id(&self) -> u32 {
        self.depot_id
    }

    pub fn encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn max_shard_size(&self) -> u64 {
        self.policy.max_shard_size
    }

    pub fn active_shard_id(&self) -> u32 {
        self.active
    }

    /// Number of shards that exist on disk or have received data
    pub fn shard_count(&self) -> usize {
        self.shards
            .iter()
            .filter(|s| s.state() != ShardState::New || s.index_exists())
            .count()
    }

    pub fn chunk_count(&self) -> usize {
        self.table.len()
    }

    /// The records of one shard, ordered by offset
    pub fn shard_records(&self, shard_id: u32) -> Vec<IndexRecord> {
        self.table.records_for_shard(shard_id)
    }

    /// All chunks ordered by shard and offset
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkHash, ChunkLocation)> + '_ {
        self.table
            .iter()
            .map(|(h, loc)| (*h, *loc))
            .sorted_by_key(|(h, loc)| (loc.shard_id, loc.offset, loc.length, *h))
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            depot_id: self.depot_id,
            encrypted: self.encrypted,
            shard_count: self.shard_count(),
            chunk_count: self.chunk_count(),
        }
    }
}

impl fmt::Display for ChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Depot {} (encrypted: {}, chunks: {}) from CSD file {}",
            self.depot_id,
            self.encrypted,
            self.table.len(),
            self.active_shard().data_path().display()
        )
    }
}

impl fmt::Debug for ChunkStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStore")
            .field("base", &self.base)
            .field("depot_id", &self.depot_id)
            .field("encrypted", &self.encrypted)
            .field("max_shard_size", &self.policy.max_shard_size)
            .field("active", &self.active)
            .field("chunks", &self.table.len())
            .finish()
    }
}

impl Drop for ChunkStore {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                shard = self.active,
                base = %self.base.display(),
                "chunk store dropped with unsealed records; call flush() or close() to write the index"
            );
        }
    }
}

impl Store for ChunkStore {
    fn add(&mut self, hash: ChunkHash, chunk: &[u8]) -> Result<()> {
        self.append(hash, chunk).map(|_| ())
    }

    fn commit(&mut self) -> Result<()> {
        self.flush()
    }

    fn get(&self, hash: &ChunkHash) -> Result<Vec<u8>> {
        self.read(hash)
    }
}
