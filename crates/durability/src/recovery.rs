//! Three-step recovery for an entity that fails checksum verification on
//! read: replay the WAL tail, fall back to the newest compaction backup,
//! or quarantine.
//!
//! A single coordinator function drives all three steps in order; there's
//! no participant registry, since there's only one embedded WAL and one
//! backup chain to consult.

use crate::checksum;
use crate::wal::{Op, WalWriter};
use entitydb_core::{Entity, EntityId, Error, Result};
use entitydb_storage::{Reader, TagDictionary};
use std::path::Path;
use std::sync::Arc;

/// Outcome of attempting to recover one entity.
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Recovered from the WAL tail.
    FromWal(Entity),
    /// Recovered from a compaction backup file.
    FromBackup(Entity),
    /// Exhausted every recovery path; the caller should quarantine `id`.
    Quarantined(EntityId),
}

/// Attempts to recover `id` after a checksum mismatch was observed on a
/// primary read.
///
/// 1. Scans the WAL tail (`wal.replay(0)`) backward for the most recent
///    record mentioning `id` whose decoded entity passes checksum
///    verification.
/// 2. Failing that, opens each `entities_backup_*.db` sidecar (newest
///    first) and attempts a direct read.
/// 3. Failing that, returns `Quarantined`.
pub fn recover_entity(
    id: &EntityId,
    wal: &WalWriter,
    backup_paths_newest_first: &[impl AsRef<Path>],
    dictionary: Arc<TagDictionary>,
) -> Result<RecoveryOutcome> {
    let records = wal.replay(0)?;
    for record in records.iter().rev() {
        if record.entity_id != *id || record.op == Op::Delete {
            continue;
        }
        if let Ok(entity) = record.decode_entity() {
            if checksum::verify(&entity) {
                tracing::info!(entity_id = %id, "recovered entity from WAL tail");
                return Ok(RecoveryOutcome::FromWal(entity));
            }
        }
    }

    for backup_path in backup_paths_newest_first {
        let backup_path = backup_path.as_ref();
        if let Ok(mut reader) = Reader::open(backup_path, dictionary.clone()) {
            if let Some(entry) = find_in_backup(backup_path, id)? {
                if let Ok(entity) = reader.read_entity(&entry) {
                    if checksum::verify(&entity) {
                        tracing::info!(
                            entity_id = %id,
                            backup = %backup_path.display(),
                            "recovered entity from compaction backup"
                        );
                        return Ok(RecoveryOutcome::FromBackup(entity));
                    }
                }
            }
        }
    }

    tracing::error!(entity_id = %id, "entity unrecoverable; quarantining");
    Ok(RecoveryOutcome::Quarantined(*id))
}

fn find_in_backup(
    backup_path: &Path,
    id: &EntityId,
) -> Result<Option<entitydb_storage::EntityIndexEntry>> {
    use entitydb_storage::format::entity_index;
    let file = entitydb_storage::UnifiedFile::open(backup_path)?;
    let header = *file.header();
    drop(file);
    let mut file = entitydb_storage::UnifiedFile::open(backup_path)?;
    let index_bytes = file.read_at(header.index_offset, header.index_len as usize)?;
    let index = entity_index::decode_all(&index_bytes)?;
    Ok(entity_index::find(&index, id).map(|pos| index[pos]))
}

/// Converts an exhausted recovery into the error the caller surfaces.
pub fn outcome_to_result(outcome: RecoveryOutcome) -> Result<Entity> {
    match outcome {
        RecoveryOutcome::FromWal(e) | RecoveryOutcome::FromBackup(e) => Ok(e),
        RecoveryOutcome::Quarantined(id) => Err(Error::Unrecoverable {
            entity_id: id.to_string(),
        }),
    }
}
