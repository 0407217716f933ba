//! Appends WAL records to a unified file's WAL section and fsyncs
//! according to the configured `DurabilityMode`.

use super::mode::DurabilityMode;
use super::record::{Lsn, Op, WalRecord};
use entitydb_core::{Entity, EntityId, Result};
use entitydb_storage::UnifiedFile;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

struct WriterState {
    file: UnifiedFile,
    pending_since_sync: usize,
}

/// Appends records to the WAL section, reserving space by growing
/// `wal_len` in the shared header before the physical write, then
/// fsyncing per `DurabilityMode`.
pub struct WalWriter {
    state: Mutex<WriterState>,
    next_lsn: AtomicU64,
    mode: DurabilityMode,
}

impl WalWriter {
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode, next_lsn: Lsn) -> Result<Self> {
        let file = UnifiedFile::open(path)?;
        Ok(WalWriter {
            state: Mutex::new(WriterState {
                file,
                pending_since_sync: 0,
            }),
            next_lsn: AtomicU64::new(next_lsn),
            mode,
        })
    }

    /// Appends a create/update record for `entity`, fsyncing per the
    /// configured durability mode, and returns the assigned LSN.
    pub fn append_entity(&self, op: Op, entity: &Entity) -> Result<Lsn> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let record = WalRecord::encode_entity(lsn, op, entity)?;
        self.append_record(&record)?;
        Ok(lsn)
    }

    /// Appends a tombstone record for `id`.
    pub fn append_delete(&self, id: EntityId) -> Result<Lsn> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let record = WalRecord::delete(lsn, id);
        self.append_record(&record)?;
        Ok(lsn)
    }

    fn append_record(&self, record: &WalRecord) -> Result<()> {
        let mut encoded = Vec::new();
        record.write_to(&mut encoded)?;

        let mut state = self.state.lock();
        let offset = state.file.append(&encoded)?;
        // Re-read the header before mutating it: the storage writer's
        // own `UnifiedFile` handle on this same path may have just
        // flushed a checkpoint (new dict/index offsets) through a write
        // this handle's cached header doesn't know about yet. Writing
        // back a stale copy here would silently undo that checkpoint.
        state.file.refresh_header()?;
        let mut header = *state.file.header();
        if header.wal_len == 0 {
            header.wal_offset = offset;
        }
        header.wal_len += encoded.len() as u64;
        header.file_size = offset + encoded.len() as u64;
        state.file.write_header(header)?;

        state.pending_since_sync += 1;
        let should_sync = match self.mode {
            DurabilityMode::Always => true,
            DurabilityMode::Standard { batch_size, .. } => {
                state.pending_since_sync >= batch_size
            }
        };
        if should_sync {
            state.file.sync()?;
            state.pending_since_sync = 0;
        }
        Ok(())
    }

    /// Forces a sync of any buffered records regardless of mode; called by
    /// the background checkpoint timer in `Standard` mode.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.file.sync()?;
        state.pending_since_sync = 0;
        Ok(())
    }

    /// Drops every record with `lsn <= lsn` from the WAL section and
    /// rewrites the surviving tail contiguously at the current end of
    /// file. Called right after a checkpoint has flushed the dict/index
    /// sections (which themselves were just appended past the old WAL
    /// tail) — rewriting here, rather than only updating bookkeeping, is
    /// what keeps `[wal_offset, wal_offset + wal_len)` a physically
    /// contiguous run of `WalRecord`s instead of a span that silently
    /// swallows the dict/index bytes a checkpoint just wrote in between.
    /// The stale bytes at the old WAL location are left in place; they're
    /// reclaimed only by `Writer::compact`, same as any other
    /// superseded region of the file.
    pub fn truncate_through(&self, lsn: Lsn) -> Result<()> {
        let mut state = self.state.lock();
        state.file.refresh_header()?;
        let header = *state.file.header();
        if header.wal_len == 0 {
            return Ok(());
        }

        let bytes = state.file.read_at(header.wal_offset, header.wal_len as usize)?;
        let mut cursor = &bytes[..];
        let mut survivors = Vec::new();
        while !cursor.is_empty() {
            match WalRecord::read_from(&mut cursor) {
                Ok(record) => {
                    if record.lsn > lsn {
                        survivors.push(record);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping corrupted WAL record during truncation");
                }
            }
        }

        let mut encoded_tail = Vec::new();
        for record in &survivors {
            record.write_to(&mut encoded_tail)?;
        }

        state.file.refresh_header()?;
        let mut header = *state.file.header();
        if encoded_tail.is_empty() {
            header.wal_len = 0;
        } else {
            let offset = state.file.append(&encoded_tail)?;
            header.wal_offset = offset;
            header.wal_len = encoded_tail.len() as u64;
            header.file_size = offset + encoded_tail.len() as u64;
        }
        state.file.write_header(header)?;
        Ok(())
    }

    pub fn next_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }

    /// Current size in bytes of the WAL section, for the admission
    /// controller's backpressure gauge.
    pub fn wal_len(&self) -> u64 {
        self.state.lock().file.header().wal_len
    }

    /// Resets the next-LSN counter, used by `Database::open` once recovery
    /// has scanned the WAL tail and knows the true high-water mark (`open`
    /// itself always starts a fresh `WalWriter` at LSN 0, since it can't
    /// know the recovered value until after the WAL has been read).
    pub fn set_next_lsn(&self, lsn: Lsn) {
        self.next_lsn.store(lsn, Ordering::SeqCst);
    }

    /// Replays every record with `lsn >= from_lsn`, in LSN order. A
    /// corrupted record (CRC mismatch) is logged and skipped rather than
    /// aborting the whole replay, per the durability invariant that one
    /// bad record shouldn't lose every entity behind it.
    pub fn replay(&self, from_lsn: Lsn) -> Result<Vec<WalRecord>> {
        let mut state = self.state.lock();
        state.file.refresh_header()?;
        let header = *state.file.header();
        if header.wal_len == 0 {
            return Ok(Vec::new());
        }
        let bytes = state.file.read_at(header.wal_offset, header.wal_len as usize)?;
        drop(state);

        let mut records = Vec::new();
        let mut cursor = &bytes[..];
        while !cursor.is_empty() {
            match WalRecord::read_from(&mut cursor) {
                Ok(record) => {
                    if record.lsn >= from_lsn {
                        records.push(record);
                    }
                }
                Err(err) => {
                    // A CRC mismatch is detected only after the record's
                    // fixed fields and payload have already been consumed
                    // from `cursor`, so scanning can continue at the next
                    // record boundary.
                    tracing::warn!(error = %err, "skipping corrupted WAL record during replay");
                }
            }
        }
        records.sort_by_key(|r| r.lsn);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::{Tag, TimestampNs};
    use tempfile::tempdir;

    #[test]
    fn append_assigns_increasing_lsns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        UnifiedFile::create(&path).unwrap();
        let writer = WalWriter::open(&path, DurabilityMode::Always, 0).unwrap();

        let entity = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            vec![],
            TimestampNs(1),
        );
        let lsn0 = writer.append_entity(Op::Create, &entity).unwrap();
        let lsn1 = writer.append_entity(Op::Update, &entity).unwrap();
        assert_eq!(lsn1, lsn0 + 1);
    }
}
