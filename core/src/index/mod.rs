//! Binary format of a shard's index file (`.csm`).
//!
//! All integers are little-endian. The file starts with a fixed 20-byte
//! header followed by one 36-byte record per chunk:
//!
//! ```text
//! 0x00  4  magic "SCFS"
//! 0x04  4  header length (0x14)
//! 0x08  4  format marker (3 = encrypted, 2 = plain)
//! 0x0C  4  depot id
//! 0x10  4  record count
//! 0x14  36 * n records: hash (20), offset (8), reserved (4), length (4)
//! ```

pub mod codec;
pub mod record;

pub use self::codec::{decode, encode, read_index_file, write_index_file};
pub use self::record::IndexRecord;

/// Magic bytes at the start of every index file
pub const MAGIC: [u8; 4] = *b"SCFS";

/// Length of the index header in bytes
pub const HEADER_LEN: usize = 0x14;

/// Length of one record in bytes
pub const RECORD_LEN: usize = 36;

/// Default maximum size of a shard's data file (1 GiB)
pub const DEFAULT_MAX_SHARD_SIZE: u64 = 1024 * 1024 * 1024;

/// Format marker written for stores holding encrypted payloads
pub const MARKER_ENCRYPTED: u32 = 0x0000_0003;

/// Format marker written for stores holding plain payloads
pub const MARKER_PLAIN: u32 = 0x0000_0002;

/// The fixed header of an index file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// The depot this shard belongs to
    pub depot_id: u32,

    /// `true` if the payloads in the data file are stored in encrypted form
    pub encrypted: bool,

    /// The raw format marker as found on disk. Encoding ignores this field
    /// and derives the marker from `encrypted`.
    pub marker: u32,

    /// Number of records following the header
    pub record_count: u32,
}

impl IndexHeader {
    pub fn new(depot_id: u32, encrypted: bool) -> Self {
        Self {
            depot_id,
            encrypted,
            marker: marker_for(encrypted),
            record_count: 0,
        }
    }

    /// `true` if the marker is one of the two values this format defines
    pub fn has_known_marker(&self) -> bool {
        self.marker == MARKER_ENCRYPTED || self.marker == MARKER_PLAIN
    }
}

/// Returns the format marker for the given encryption flag
pub fn marker_for(encrypted: bool) -> u32 {
    if encrypted {
        MARKER_ENCRYPTED
    } else {
        MARKER_PLAIN
    }
}

/// Interprets a format marker. Only the low 16 bits are significant and any
/// value other than 3 means "not encrypted".
pub fn marker_is_encrypted(marker: u32) -> bool {
    marker & 0xffff == MARKER_ENCRYPTED
}
