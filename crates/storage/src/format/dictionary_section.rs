//! On-disk encoding of the tag dictionary section: a flat list of
//! `(id, wire_string)` pairs, written fresh at every checkpoint/compact
//! alongside the entity index.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use entitydb_core::Result;
use std::io::{Read, Write};

pub fn encode_all(entries: &[(u32, String)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    for (id, wire) in entries {
        buf.write_u32::<LittleEndian>(*id)?;
        let wire_bytes = wire.as_bytes();
        buf.write_u32::<LittleEndian>(wire_bytes.len() as u32)?;
        buf.write_all(wire_bytes)?;
    }
    Ok(buf)
}

pub fn decode_all(bytes: &[u8]) -> Result<Vec<(u32, String)>> {
    let mut out = Vec::new();
    let mut cursor = bytes;
    while !cursor.is_empty() {
        let id = cursor.read_u32::<LittleEndian>()?;
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let mut wire_bytes = vec![0u8; len];
        cursor.read_exact(&mut wire_bytes)?;
        let wire = String::from_utf8(wire_bytes).map_err(|e| {
            entitydb_core::Error::CorruptHeader(format!("non-utf8 dictionary entry: {e}"))
        })?;
        out.push((id, wire));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_entries() {
        let entries = vec![(0u32, "1|dataset:orders".to_string()), (1u32, "2|type:order".to_string())];
        let bytes = encode_all(&entries).unwrap();
        let decoded = decode_all(&bytes).unwrap();
        assert_eq!(entries, decoded);
    }

    #[test]
    fn empty_section_roundtrips() {
        let bytes = encode_all(&[]).unwrap();
        assert!(decode_all(&bytes).unwrap().is_empty());
    }
}
