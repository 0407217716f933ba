//! Entity records in the unified file's data section.
//!
//! Each record is `{ modified_ns: u64, tag_count: u16, content_size: u32,
//! reserved: u16, tag_ids: [u32; tag_count], content: [u8; content_size] }`.
//! `tag_ids` reference dictionary entries for the *timestamped* wire form
//! of each tag (`"<ns>|<tag>"`), so the temporal stream round-trips.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use entitydb_core::Result;
use std::io::{Read, Write};

/// One entity record as it appears in the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    pub modified_ns: u64,
    pub tag_ids: Vec<u32>,
    pub content: Vec<u8>,
}

impl DataRecord {
    /// Size in bytes this record occupies once encoded.
    pub fn encoded_len(&self) -> usize {
        8 + 2 + 4 + 2 + self.tag_ids.len() * 4 + self.content.len()
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_u64::<LittleEndian>(self.modified_ns)?;
        w.write_u16::<LittleEndian>(self.tag_ids.len() as u16)?;
        w.write_u32::<LittleEndian>(self.content.len() as u32)?;
        w.write_u16::<LittleEndian>(0)?; // reserved
        for id in &self.tag_ids {
            w.write_u32::<LittleEndian>(*id)?;
        }
        w.write_all(&self.content)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let modified_ns = r.read_u64::<LittleEndian>()?;
        let tag_count = r.read_u16::<LittleEndian>()?;
        let content_size = r.read_u32::<LittleEndian>()?;
        let _reserved = r.read_u16::<LittleEndian>()?;
        let mut tag_ids = Vec::with_capacity(tag_count as usize);
        for _ in 0..tag_count {
            tag_ids.push(r.read_u32::<LittleEndian>()?);
        }
        let mut content = vec![0u8; content_size as usize];
        r.read_exact(&mut content)?;
        Ok(DataRecord {
            modified_ns,
            tag_ids,
            content,
        })
    }
}
