use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::{IoResultExt, Result, StoreError},
    index::{write_index_file, IndexHeader, IndexRecord},
};

/// File extension of index files
pub const INDEX_EXTENSION: &str = "csm";

/// File extension of data files
pub const DATA_EXTENSION: &str = "csd";

/// Lifecycle of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardState {
    /// Nothing has been written yet
    New,

    /// The shard accepts appends. Its index file (if any) may be stale.
    Open,

    /// The index file lists every chunk in the data file
    Sealed,
}

/// Builds the path `<base>_<id>.<extension>`
pub fn shard_path(base: &Path, id: u32, extension: &str) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(format!("_{id}.{extension}"));
    PathBuf::from(s)
}

/// One data file and its index file. File handles are only held for the
/// duration of a single operation.
#[derive(Debug)]
pub struct Shard {
    id: u32,
    index_path: PathBuf,
    data_path: PathBuf,
    state: ShardState,
}

impl Shard {
    /// Create a handle for a shard that has not been written yet
    pub fn new(base: &Path, id: u32) -> Self {
        Self {
            id,
            index_path: shard_path(base, id, INDEX_EXTENSION),
            data_path: shard_path(base, id, DATA_EXTENSION),
            state: ShardState::New,
        }
    }

    /// Create a handle for a shard whose index file exists on disk
    pub fn sealed(base: &Path, id: u32) -> Self {
        Self {
            state: ShardState::Sealed,
            ..Self::new(base, id)
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn state(&self) -> ShardState {
        self.state
    }

    /// Current size of the data file, 0 if it does not exist yet
    pub fn data_len(&self) -> Result<u64> {
        match fs::metadata(&self.data_path) {
            Ok(m) => Ok(m.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(StoreError::io(&self.data_path, e)),
        }
    }

    pub fn index_exists(&self) -> bool {
        self.index_path.exists()
    }

    /// Append `data` to the data file and return the offset at which it was
    /// written. If the write fails, the data file is truncated back to its
    /// previous length.
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        if let Some(parent) = self.data_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).at(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.data_path)
            .at(&self.data_path)?;
        let offset = file.metadata().at(&self.data_path)?.len();

        if let Err(e) = file.write_all(data).and_then(|_| file.flush()) {
            self.truncate(&file, offset);
            return Err(StoreError::io(&self.data_path, e));
        }

        self.state = ShardState::Open;
        Ok(offset)
    }

    /// Cut a partially written chunk off the data file. Returns `false` and
    /// logs a warning if the file keeps its partial tail.
    fn truncate(&self, file: &File, offset: u64) -> bool {
        match file.set_len(offset) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    path = %self.data_path.display(),
                    offset,
                    error = %e,
                    "unable to truncate data file after failed append, it has a partial tail"
                );
                false
            }
        }
    }

    /// Read `length` bytes at `offset` from the data file
    pub fn read_at(&self, offset: u64, length: u32) -> Result<Vec<u8>> {
        let mut file = File::open(&self.data_path).at(&self.data_path)?;
        file.seek(SeekFrom::Start(offset)).at(&self.data_path)?;

        let mut buf = vec![0u8; length as usize];
        match file.read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(StoreError::Integrity(format!(
                    "data file `{}' is too short to contain {length} bytes at offset {offset}",
                    self.data_path.display()
                )))
            }
            Err(e) => Err(StoreError::io(&self.data_path, e)),
        }
    }

    /// Make sure every record lies within the data file
    pub fn check_records(&self, records: &[IndexRecord]) -> Result<()> {
        let data_len = self.data_len()?;
        for r in records {
            match r.end() {
                Some(end) if end <= data_len => {}
                Some(end) => {
                    return Err(StoreError::Integrity(format!(
                        "index `{}' lists chunk {} at {}..{end}, but data file `{}' is only {data_len} bytes long",
                        self.index_path.display(),
                        r.hash,
                        r.offset,
                        self.data_path.display()
                    )))
                }
                None => {
                    return Err(StoreError::Integrity(format!(
                        "index `{}' lists chunk {} at offset {} with length {}, which lies beyond any possible file size",
                        self.index_path.display(),
                        r.hash,
                        r.offset,
                        r.length
                    )))
                }
            }
        }
        Ok(())
    }

    /// Write the index file listing `records`
    pub fn seal(&mut self, header: &IndexHeader, records: &[IndexRecord]) -> Result<()> {
        write_index_file(&self.index_path, header, records)?;
        debug!(
            shard = self.id,
            records = records.len(),
            path = %self.index_path.display(),
            "sealed shard"
        );
        self.state = ShardState::Sealed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{self, File, OpenOptions},
        path::Path,
    };

    use assertor::{assert_that, BooleanAssertion, EqualityAssertion};
    use pretty_assertions::assert_eq;
    use tempdir::TempDir;

    use crate::{
        error::StoreError,
        hash::ChunkHash,
        index::{read_index_file, IndexHeader, IndexRecord},
    };

    use super::{shard_path, Shard, ShardState};

    #[test]
    fn paths() {
        let base = Path::new("/var/cache/depot_228990");
        assert_eq!(
            shard_path(base, 3, "csm"),
            Path::new("/var/cache/depot_228990_3.csm")
        );

        let shard = Shard::new(base, 1);
        assert_eq!(shard.data_path(), Path::new("/var/cache/depot_228990_1.csd"));
        assert_eq!(shard.index_path(), Path::new("/var/cache/depot_228990_1.csm"));
    }

    #[test]
    fn append_and_read() {
        let dir = TempDir::new("chunkstore_shard").unwrap();
        let mut shard = Shard::new(&dir.path().join("nested").join("depot"), 1);
        assert_that!(shard.data_len().unwrap()).is_equal_to(0);
        assert_that!(shard.state()).is_equal_to(ShardState::New);

        assert_that!(shard.append(b"hello").unwrap()).is_equal_to(0);
        assert_that!(shard.append(b" world").unwrap()).is_equal_to(5);
        assert_that!(shard.state()).is_equal_to(ShardState::Open);
        assert_that!(shard.data_len().unwrap()).is_equal_to(11);

        assert_eq!(shard.read_at(6, 5).unwrap(), b"world");
        assert_eq!(shard.read_at(0, 0).unwrap(), b"");
    }

    #[test]
    fn short_read() {
        let dir = TempDir::new("chunkstore_shard").unwrap();
        let mut shard = Shard::new(&dir.path().join("depot"), 1);
        shard.append(b"abc").unwrap();

        let err = shard.read_at(1, 10).unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[test]
    fn check_records() {
        let dir = TempDir::new("chunkstore_shard").unwrap();
        let mut shard = Shard::new(&dir.path().join("depot"), 1);
        shard.append(&[0u8; 10]).unwrap();

        let ok = IndexRecord::new(ChunkHash([1; 20]), 0, 10);
        let too_long = IndexRecord::new(ChunkHash([2; 20]), 5, 6);
        let overflowing = IndexRecord::new(ChunkHash([3; 20]), u64::MAX - 1, 4);
        assert_that!(shard.check_records(&[ok]).is_ok()).is_true();
        assert!(matches!(
            shard.check_records(&[ok, too_long]),
            Err(StoreError::Integrity(_))
        ));
        assert!(matches!(
            shard.check_records(&[overflowing]),
            Err(StoreError::Integrity(_))
        ));
    }

    #[test]
    fn truncate() {
        let dir = TempDir::new("chunkstore_shard").unwrap();
        let mut shard = Shard::new(&dir.path().join("depot"), 1);
        shard.append(b"complete partial").unwrap();

        let writable = OpenOptions::new().write(true).open(shard.data_path()).unwrap();
        assert_that!(shard.truncate(&writable, 8)).is_true();
        assert_that!(shard.data_len().unwrap()).is_equal_to(8);

        // a read-only handle cannot shrink the file
        let read_only = File::open(shard.data_path()).unwrap();
        assert_that!(shard.truncate(&read_only, 0)).is_false();
        assert_that!(shard.data_len().unwrap()).is_equal_to(8);
    }

    #[test]
    fn seal() {
        let dir = TempDir::new("chunkstore_shard").unwrap();
        let mut shard = Shard::new(&dir.path().join("depot"), 2);
        shard.append(b"abc").unwrap();

        let records = vec![IndexRecord::new(ChunkHash([1; 20]), 0, 3)];
        shard.seal(&IndexHeader::new(5, false), &records).unwrap();
        assert_that!(shard.state()).is_equal_to(ShardState::Sealed);
        assert_that!(shard.index_exists()).is_true();

        let (header, read) = read_index_file(shard.index_path()).unwrap();
        assert_that!(header.depot_id).is_equal_to(5);
        assert_that!(read).is_equal_to(records);
        assert_that!(fs::metadata(shard.index_path()).unwrap().len()).is_equal_to(56);
    }
}
