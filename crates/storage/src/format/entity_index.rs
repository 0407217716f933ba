//! The entity index section: a sorted array of fixed-width entries
//! mapping entity id to its data-section record location.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use entitydb_core::{EntityId, Result};
use std::io::{Read, Write};

/// Tombstone bit: set when the entity has been deleted but its record
/// space not yet reclaimed by compaction.
pub const FLAG_PURGED: u32 = 1 << 0;

/// One fixed-width entry in the entity index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityIndexEntry {
    pub entity_id: EntityId,
    pub offset: u64,
    pub size: u32,
    pub flags: u32,
}

/// Size of one encoded entry: 64-byte id + 8-byte offset + 4-byte size +
/// 4-byte flags.
pub const ENTRY_LEN: usize = 64 + 8 + 4 + 4;

impl EntityIndexEntry {
    pub fn is_purged(&self) -> bool {
        self.flags & FLAG_PURGED != 0
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        w.write_all(self.entity_id.as_bytes())?;
        w.write_u64::<LittleEndian>(self.offset)?;
        w.write_u32::<LittleEndian>(self.size)?;
        w.write_u32::<LittleEndian>(self.flags)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let mut id_bytes = [0u8; 64];
        r.read_exact(&mut id_bytes)?;
        let id_str = std::str::from_utf8(&id_bytes)
            .ok()
            .and_then(EntityId::parse)
            .ok_or_else(|| {
                entitydb_core::Error::CorruptHeader("malformed entity id in index entry".into())
            })?;
        let offset = r.read_u64::<LittleEndian>()?;
        let size = r.read_u32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        Ok(EntityIndexEntry {
            entity_id: id_str,
            offset,
            size,
            flags,
        })
    }
}

/// Encodes a sorted-by-id slice of entries.
pub fn encode_all(entries: &[EntityIndexEntry]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(entries.len() * ENTRY_LEN);
    for entry in entries {
        entry.write_to(&mut buf)?;
    }
    Ok(buf)
}

/// Decodes a flat entity-index byte buffer back into entries.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<EntityIndexEntry>> {
    let mut out = Vec::with_capacity(bytes.len() / ENTRY_LEN);
    let mut cursor = bytes;
    while !cursor.is_empty() {
        let entry = EntityIndexEntry::read_from(&mut cursor)?;
        out.push(entry);
    }
    Ok(out)
}

/// Binary-searches a sorted entry slice by entity id.
pub fn find(entries: &[EntityIndexEntry], id: &EntityId) -> Option<usize> {
    entries.binary_search_by_key(id, |e| e.entity_id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_a_batch() {
        let entries = vec![
            EntityIndexEntry {
                entity_id: EntityId::generate(),
                offset: 128,
                size: 64,
                flags: 0,
            },
            EntityIndexEntry {
                entity_id: EntityId::generate(),
                offset: 200,
                size: 32,
                flags: FLAG_PURGED,
            },
        ];
        let mut sorted = entries.clone();
        sorted.sort_by_key(|e| e.entity_id);
        let bytes = encode_all(&sorted).unwrap();
        let decoded = decode_all(&bytes).unwrap();
        assert_eq!(sorted, decoded);
        assert!(decoded[1].is_purged());
    }

    #[test]
    fn find_locates_entry() {
        let a = EntityIndexEntry {
            entity_id: EntityId::generate(),
            offset: 0,
            size: 0,
            flags: 0,
        };
        let b = EntityIndexEntry {
            entity_id: EntityId::generate(),
            offset: 10,
            size: 0,
            flags: 0,
        };
        let mut entries = vec![a, b];
        entries.sort_by_key(|e| e.entity_id);
        let found = find(&entries, &entries[1].entity_id).unwrap();
        assert_eq!(entries[found].entity_id, entries[1].entity_id);
    }
}
