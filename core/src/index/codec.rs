use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use itertools::Itertools;
use thiserror::Error;

use crate::{
    error::{IoResultExt, Result, StoreError},
    hash::{ChunkHash, HASH_LEN},
};

use super::{
    marker_for, marker_is_encrypted, IndexHeader, IndexRecord, HEADER_LEN, MAGIC, RECORD_LEN,
};

/// Reasons why bytes could not be decoded as an index file
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("file is {0} bytes long, shorter than the index header")]
    TooShort(usize),

    #[error("bad magic {0:02x?}, expected \"SCFS\"")]
    BadMagic([u8; 4]),

    #[error("unsupported header length {0}")]
    BadHeaderLength(u32),

    #[error("header announces {count} records but the file holds {body_len} bytes of records")]
    RecordCountMismatch { count: u32, body_len: usize },
}

fn u32_at(bytes: &[u8], pos: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[pos..pos + 4]);
    u32::from_le_bytes(buf)
}

fn u64_at(bytes: &[u8], pos: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[pos..pos + 8]);
    u64::from_le_bytes(buf)
}

/// Decode the contents of an index file. Records are returned in the order
/// in which they appear in the file.
pub fn decode(bytes: &[u8]) -> Result<(IndexHeader, Vec<IndexRecord>), DecodeError> {
    if bytes.len() < HEADER_LEN {
        // a short file may still carry a recognisable (or wrong) magic
        if bytes.len() >= 4 && bytes[0..4] != MAGIC {
            return Err(DecodeError::BadMagic([bytes[0], bytes[1], bytes[2], bytes[3]]));
        }
        return Err(DecodeError::TooShort(bytes.len()));
    }

    if bytes[0..4] != MAGIC {
        return Err(DecodeError::BadMagic([bytes[0], bytes[1], bytes[2], bytes[3]]));
    }

    let header_len = u32_at(bytes, 0x04);
    if header_len as usize != HEADER_LEN {
        return Err(DecodeError::BadHeaderLength(header_len));
    }

    let marker = u32_at(bytes, 0x08);
    let header = IndexHeader {
        depot_id: u32_at(bytes, 0x0c),
        encrypted: marker_is_encrypted(marker),
        marker,
        record_count: u32_at(bytes, 0x10),
    };

    let body = &bytes[HEADER_LEN..];
    if body.len() != header.record_count as usize * RECORD_LEN {
        return Err(DecodeError::RecordCountMismatch {
            count: header.record_count,
            body_len: body.len(),
        });
    }

    let records = body
        .chunks_exact(RECORD_LEN)
        .map(|r| {
            let mut hash = [0u8; HASH_LEN];
            hash.copy_from_slice(&r[0..HASH_LEN]);
            // bytes 28..32 are reserved and ignored
            IndexRecord::new(ChunkHash(hash), u64_at(r, 20), u32_at(r, 32))
        })
        .collect();

    Ok((header, records))
}

/// Encode an index file. Records are written sorted by offset, so two
/// encodes of the same set of records are byte-identical regardless of the
/// order in which they were given. The header's marker and record count are
/// derived from `header.encrypted` and `records`.
pub fn encode(header: &IndexHeader, records: &[IndexRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + records.len() * RECORD_LEN);

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&marker_for(header.encrypted).to_le_bytes());
    out.extend_from_slice(&header.depot_id.to_le_bytes());
    out.extend_from_slice(&(records.len() as u32).to_le_bytes());

    for r in records.iter().sorted_by_key(|r| r.sort_key()) {
        out.extend_from_slice(r.hash.as_bytes());
        out.extend_from_slice(&r.offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&r.length.to_le_bytes());
    }

    out
}

/// Read and decode the index file at `path`
pub fn read_index_file(path: &Path) -> Result<(IndexHeader, Vec<IndexRecord>)> {
    let bytes = fs::read(path).at(path)?;
    decode(&bytes).map_err(|e| StoreError::format(path, e.to_string()))
}

/// Encode and write an index file. The bytes are written to a temporary
/// file next to `path` first and then renamed into place, so readers never
/// see a partially written index.
pub fn write_index_file(path: &Path, header: &IndexHeader, records: &[IndexRecord]) -> Result<()> {
    let bytes = encode(header, records);

    let tmp_path = path.with_extension("csm.tmp");
    {
        let mut file = File::create(&tmp_path).at(&tmp_path)?;
        file.write_all(&bytes).at(&tmp_path)?;
        file.sync_all().at(&tmp_path)?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::io(path, e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, BooleanAssertion, EqualityAssertion, VecAssertion};
    use pretty_assertions::assert_eq;
    use tempdir::TempDir;

    use crate::{
        hash::ChunkHash,
        index::{IndexHeader, IndexRecord, HEADER_LEN, MARKER_ENCRYPTED, MARKER_PLAIN},
    };

    use super::{decode, encode, read_index_file, write_index_file, DecodeError};

    fn hash(b: u8) -> ChunkHash {
        ChunkHash([b; 20])
    }

    /// Check the exact byte layout of a small index
    #[test]
    fn layout() {
        let header = IndexHeader::new(0x01020304, false);
        let records = vec![IndexRecord::new(hash(0xaa), 0x10, 0x20)];
        let bytes = encode(&header, &records);

        let mut expected = Vec::new();
        expected.extend_from_slice(b"SCFS");
        expected.extend_from_slice(&[0x14, 0, 0, 0]);
        expected.extend_from_slice(&[0x02, 0, 0, 0]);
        expected.extend_from_slice(&[0x04, 0x03, 0x02, 0x01]);
        expected.extend_from_slice(&[0x01, 0, 0, 0]);
        expected.extend_from_slice(&[0xaa; 20]);
        expected.extend_from_slice(&[0x10, 0, 0, 0, 0, 0, 0, 0]);
        expected.extend_from_slice(&[0, 0, 0, 0]);
        expected.extend_from_slice(&[0x20, 0, 0, 0]);

        assert_eq!(bytes, expected);
    }

    #[test]
    fn encode_sorts_by_offset() {
        let header = IndexHeader::new(7, true);
        let a = IndexRecord::new(hash(1), 100, 5);
        let b = IndexRecord::new(hash(2), 0, 100);
        let c = IndexRecord::new(hash(3), 105, 1);

        let bytes1 = encode(&header, &[a, b, c]);
        let bytes2 = encode(&header, &[c, a, b]);
        assert_eq!(bytes1, bytes2);

        let (_, decoded) = decode(&bytes1).unwrap();
        assert_that!(decoded).is_equal_to(vec![b, a, c]);
    }

    #[test]
    fn header_markers() {
        let bytes = encode(&IndexHeader::new(1, true), &[]);
        assert_that!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()))
            .is_equal_to(MARKER_ENCRYPTED);
        let (header, _) = decode(&bytes).unwrap();
        assert_that!(header.encrypted).is_true();

        let bytes = encode(&IndexHeader::new(1, false), &[]);
        assert_that!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()))
            .is_equal_to(MARKER_PLAIN);
        let (header, _) = decode(&bytes).unwrap();
        assert_that!(header.encrypted).is_false();
    }

    /// Only the low 16 bits of the marker decide whether a store is
    /// encrypted. Anything but 3 is treated as plain.
    #[test]
    fn lenient_markers() {
        let mut bytes = encode(&IndexHeader::new(1, false), &[]);

        bytes[8..12].copy_from_slice(&0xffff_0003u32.to_le_bytes());
        let (header, _) = decode(&bytes).unwrap();
        assert_that!(header.encrypted).is_true();
        assert_that!(header.has_known_marker()).is_false();

        bytes[8..12].copy_from_slice(&0x0000_0007u32.to_le_bytes());
        let (header, _) = decode(&bytes).unwrap();
        assert_that!(header.encrypted).is_false();
        assert_that!(header.marker).is_equal_to(7);
    }

    #[test]
    fn bad_magic() {
        let mut bytes = encode(&IndexHeader::new(1, false), &[]);
        bytes[0] = b'X';
        assert_eq!(
            decode(&bytes).unwrap_err(),
            DecodeError::BadMagic(*b"XCFS")
        );
        assert_eq!(
            decode(b"NOPE").unwrap_err(),
            DecodeError::BadMagic(*b"NOPE")
        );
    }

    #[test]
    fn malformed() {
        assert_eq!(decode(b"SC").unwrap_err(), DecodeError::TooShort(2));

        let mut bytes = encode(&IndexHeader::new(1, false), &[]);
        bytes[4] = 0x18;
        assert_eq!(
            decode(&bytes).unwrap_err(),
            DecodeError::BadHeaderLength(0x18)
        );

        let mut bytes = encode(
            &IndexHeader::new(1, false),
            &[IndexRecord::new(hash(1), 0, 1)],
        );
        bytes.truncate(bytes.len() - 1);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            DecodeError::RecordCountMismatch {
                count: 1,
                body_len: 35
            }
        );
    }

    #[test]
    fn empty_index() {
        let bytes = encode(&IndexHeader::new(42, false), &[]);
        assert_that!(bytes.len()).is_equal_to(HEADER_LEN);
        let (header, records) = decode(&bytes).unwrap();
        assert_that!(header.depot_id).is_equal_to(42);
        assert_that!(header.record_count).is_equal_to(0);
        assert_that!(records).is_empty();
    }

    #[test]
    fn file_round_trip() {
        let dir = TempDir::new("chunkstore_codec").unwrap();
        let path = dir.path().join("depot_1.csm");

        let header = IndexHeader::new(228990, true);
        let records = vec![
            IndexRecord::new(hash(1), 0, 10),
            IndexRecord::new(hash(2), 10, 3),
        ];
        write_index_file(&path, &header, &records).unwrap();

        let (read_header, read_records) = read_index_file(&path).unwrap();
        assert_that!(read_header.depot_id).is_equal_to(228990);
        assert_that!(read_header.encrypted).is_true();
        assert_that!(read_header.record_count).is_equal_to(2);
        assert_that!(read_records).is_equal_to(records);

        // no temporary file is left behind
        assert_that!(dir.path().join("depot_1.csm.tmp").exists()).is_false();
    }
}
