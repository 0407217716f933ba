//! Write-ahead-log record format: length-prefixed records with a
//! trailing `crc32fast` checksum. `payload` is the `bincode`-encoded
//! `Entity` for the operation.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use entitydb_core::{Entity, EntityId, Error, Result};
use std::io::{Read, Write};

/// Log sequence number: monotonically increasing, unique per WAL record.
pub type Lsn = u64;

/// The kind of mutation a WAL record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Create = 0,
    Update = 1,
    Delete = 2,
}

impl Op {
    fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Op::Create),
            1 => Ok(Op::Update),
            2 => Ok(Op::Delete),
            other => Err(Error::CorruptHeader(format!("unknown WAL op byte {other}"))),
        }
    }
}

/// One WAL record: `{ lsn, op, entity_id, payload_len, payload, crc32 }`.
/// `crc32` covers every preceding field.
#[derive(Debug, Clone)]
pub struct WalRecord {
    pub lsn: Lsn,
    pub op: Op,
    pub entity_id: EntityId,
    pub payload: Vec<u8>,
}

impl WalRecord {
    /// Builds a record for `entity`, bincode-encoding it as the payload.
    pub fn encode_entity(lsn: Lsn, op: Op, entity: &Entity) -> Result<Self> {
        let payload = bincode::serialize(entity)?;
        Ok(WalRecord {
            lsn,
            op,
            entity_id: entity.id,
            payload,
        })
    }

    /// A tombstone record carrying no payload.
    pub fn delete(lsn: Lsn, entity_id: EntityId) -> Self {
        WalRecord {
            lsn,
            op: Op::Delete,
            entity_id,
            payload: Vec::new(),
        }
    }

    /// Decodes the payload as a bincode-encoded `Entity`.
    pub fn decode_entity(&self) -> Result<Entity> {
        Ok(bincode::deserialize(&self.payload)?)
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> Result<()> {
        let mut body = Vec::with_capacity(8 + 1 + 64 + 4 + self.payload.len());
        body.write_u64::<LittleEndian>(self.lsn)?;
        body.write_u8(self.op as u8)?;
        body.write_all(self.entity_id.as_bytes())?;
        body.write_u32::<LittleEndian>(self.payload.len() as u32)?;
        body.write_all(&self.payload)?;

        let crc = crc32fast::hash(&body);
        w.write_all(&body)?;
        w.write_u32::<LittleEndian>(crc)?;
        Ok(())
    }

    /// Reads one record, verifying its trailing CRC32. A corrupted record
    /// is reported via `Error::ChecksumMismatch` so the caller (WAL
    /// replay) can choose to skip it rather than abort the whole replay.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let lsn = r.read_u64::<LittleEndian>()?;
        let op = Op::from_u8(r.read_u8()?)?;
        let mut id_bytes = [0u8; 64];
        r.read_exact(&mut id_bytes)?;
        let entity_id = std::str::from_utf8(&id_bytes)
            .ok()
            .and_then(EntityId::parse)
            .ok_or_else(|| Error::CorruptHeader("malformed entity id in WAL record".into()))?;
        let payload_len = r.read_u32::<LittleEndian>()?;
        let mut payload = vec![0u8; payload_len as usize];
        r.read_exact(&mut payload)?;
        let stored_crc = r.read_u32::<LittleEndian>()?;

        let mut body = Vec::with_capacity(8 + 1 + 64 + 4 + payload.len());
        body.write_u64::<LittleEndian>(lsn)?;
        body.write_u8(op as u8)?;
        body.write_all(entity_id.as_bytes())?;
        body.write_u32::<LittleEndian>(payload_len)?;
        body.write_all(&payload)?;
        let expected_crc = crc32fast::hash(&body);
        if stored_crc != expected_crc {
            return Err(Error::ChecksumMismatch {
                entity_id: entity_id.to_string(),
            });
        }

        Ok(WalRecord {
            lsn,
            op,
            entity_id,
            payload,
        })
    }
}
