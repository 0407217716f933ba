//! The 128-byte fixed header of a unified `.edb` file: magic, version,
//! and a CRC trailer over little-endian integer fields (`byteorder`),
//! followed by the offsets of the file's four sections.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use entitydb_core::{Error, Result};
use std::io::{Cursor, Read, Write};

/// Fixed magic bytes identifying a unified EntityDB file.
pub const MAGIC: [u8; 4] = *b"EUFF";
/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 2;
/// Total on-disk size of the header, including its zero-padded reserved tail.
pub const HEADER_LEN: usize = 128;
/// Size of the checksummed body: one `u32` (version) plus eleven `u64`
/// fields, following the 4-byte magic.
const BODY_LEN: usize = 4 + 11 * 8;

/// The fixed header at offset 0 of every unified file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub file_size: u64,
    pub data_offset: u64,
    pub data_len: u64,
    pub dict_offset: u64,
    pub dict_len: u64,
    pub index_offset: u64,
    pub index_len: u64,
    pub wal_offset: u64,
    pub wal_len: u64,
    pub entity_count: u64,
    pub last_modified_ns: u64,
}

impl FileHeader {
    /// A header describing an empty file with all four sections
    /// immediately following the header, in size order.
    pub fn empty() -> Self {
        FileHeader {
            version: FORMAT_VERSION,
            file_size: HEADER_LEN as u64,
            data_offset: HEADER_LEN as u64,
            data_len: 0,
            dict_offset: HEADER_LEN as u64,
            dict_len: 0,
            index_offset: HEADER_LEN as u64,
            index_len: 0,
            wal_offset: HEADER_LEN as u64,
            wal_len: 0,
            entity_count: 0,
            last_modified_ns: 0,
        }
    }

    /// Serializes the header to its 128-byte on-disk form, computing the
    /// trailing CRC32 over every preceding byte.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&MAGIC);
        buf.write_u32::<LittleEndian>(self.version).unwrap();
        buf.write_u64::<LittleEndian>(self.file_size).unwrap();
        buf.write_u64::<LittleEndian>(self.data_offset).unwrap();
        buf.write_u64::<LittleEndian>(self.data_len).unwrap();
        buf.write_u64::<LittleEndian>(self.dict_offset).unwrap();
        buf.write_u64::<LittleEndian>(self.dict_len).unwrap();
        buf.write_u64::<LittleEndian>(self.index_offset).unwrap();
        buf.write_u64::<LittleEndian>(self.index_len).unwrap();
        buf.write_u64::<LittleEndian>(self.wal_offset).unwrap();
        buf.write_u64::<LittleEndian>(self.wal_len).unwrap();
        buf.write_u64::<LittleEndian>(self.entity_count).unwrap();
        buf.write_u64::<LittleEndian>(self.last_modified_ns)
            .unwrap();

        let checksum = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(checksum).unwrap();

        buf.resize(HEADER_LEN, 0);
        let mut out = [0u8; HEADER_LEN];
        out.copy_from_slice(&buf);
        out
    }

    /// Parses and validates a header from its 128-byte on-disk form,
    /// checking magic, version, and trailing checksum.
    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if bytes[0..4] != MAGIC {
            return Err(Error::CorruptHeader(format!(
                "bad magic: expected {:?}, found {:?}",
                MAGIC,
                &bytes[0..4]
            )));
        }

        let body_with_magic = &bytes[0..4 + BODY_LEN];
        let expected_checksum = crc32fast::hash(body_with_magic);
        let mut checksum_cursor = Cursor::new(&bytes[4 + BODY_LEN..4 + BODY_LEN + 4]);
        let stored_checksum = checksum_cursor.read_u32::<LittleEndian>()?;
        if stored_checksum != expected_checksum {
            return Err(Error::ChecksumMismatch {
                entity_id: "<file header>".to_string(),
            });
        }

        let mut cursor = Cursor::new(&bytes[4..]);
        let version = cursor.read_u32::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(Error::CorruptHeader(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            )));
        }
        let file_size = cursor.read_u64::<LittleEndian>()?;
        let data_offset = cursor.read_u64::<LittleEndian>()?;
        let data_len = cursor.read_u64::<LittleEndian>()?;
        let dict_offset = cursor.read_u64::<LittleEndian>()?;
        let dict_len = cursor.read_u64::<LittleEndian>()?;
        let index_offset = cursor.read_u64::<LittleEndian>()?;
        let index_len = cursor.read_u64::<LittleEndian>()?;
        let wal_offset = cursor.read_u64::<LittleEndian>()?;
        let wal_len = cursor.read_u64::<LittleEndian>()?;
        let entity_count = cursor.read_u64::<LittleEndian>()?;
        let last_modified_ns = cursor.read_u64::<LittleEndian>()?;

        Ok(FileHeader {
            version,
            file_size,
            data_offset,
            data_len,
            dict_offset,
            dict_len,
            index_offset,
            index_len,
            wal_offset,
            wal_len,
            entity_count,
            last_modified_ns,
        })
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        r.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(&self.to_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let mut h = FileHeader::empty();
        h.entity_count = 42;
        h.last_modified_ns = 1234;
        let bytes = h.to_bytes();
        let parsed = FileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = FileHeader::empty().to_bytes();
        bytes[0] = b'X';
        assert!(FileHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut bytes = FileHeader::empty().to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = FileHeader::from_bytes(&bytes).unwrap_err();
        assert!(err.is_corruption());
    }
}
