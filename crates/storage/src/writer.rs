//! Writes entity records into the unified file's data section and keeps
//! the in-memory entity index up to date, periodically flushing both the
//! index section and a trimmed header to disk.

use crate::dictionary::TagDictionary;
use crate::format::entity_index::{self, EntityIndexEntry, FLAG_PURGED};
use crate::format::{DataRecord, FileHeader, UnifiedFile};
use entitydb_core::{Entity, EntityId, Result};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Writes entities to the data section and maintains the sorted entity
/// index in memory, flushing to disk at `checkpoint()`.
pub struct Writer {
    file: Mutex<UnifiedFile>,
    dictionary: Arc<TagDictionary>,
    index: RwLock<Vec<EntityIndexEntry>>,
}

impl Writer {
    pub fn new(file: UnifiedFile, dictionary: Arc<TagDictionary>, index: Vec<EntityIndexEntry>) -> Self {
        Writer {
            file: Mutex::new(file),
            dictionary,
            index: RwLock::new(index),
        }
    }

    /// Serializes `entity` via the tag dictionary and appends (or,
    /// if an equal-or-smaller slot is already reserved for this id,
    /// overwrites in place) its data-section record, then updates the
    /// sorted entity index entry.
    pub fn write(&self, entity: &Entity) -> Result<EntityIndexEntry> {
        let tag_ids: Vec<u32> = entity
            .tags
            .iter()
            .map(|tt| self.dictionary.intern(tt))
            .collect();
        let record = DataRecord {
            modified_ns: entity.updated_at.0,
            tag_ids,
            content: entity.content.clone(),
        };
        let mut encoded = Vec::with_capacity(record.encoded_len());
        record.write_to(&mut encoded)?;

        let mut file = self.file.lock();
        let existing = {
            let index = self.index.read();
            entity_index::find(&index, &entity.id).map(|i| index[i])
        };
        let (offset, size) = if let Some(existing) = existing {
            if (existing.size as usize) >= encoded.len() {
                file.write_at(existing.offset, &encoded)?;
                (existing.offset, existing.size)
            } else {
                let offset = file.append(&encoded)?;
                (offset, encoded.len() as u32)
            }
        } else {
            let offset = file.append(&encoded)?;
            (offset, encoded.len() as u32)
        };

        let entry = EntityIndexEntry {
            entity_id: entity.id,
            offset,
            size,
            flags: 0,
        };
        self.upsert_index_entry(entry);
        Ok(entry)
    }

    /// Marks an entity's index entry as tombstoned. Physical space is
    /// reclaimed only by `compact()`.
    pub fn tombstone(&self, id: &EntityId) {
        let mut index = self.index.write();
        if let Some(pos) = entity_index::find(&index, id) {
            index[pos].flags |= FLAG_PURGED;
        }
    }

    fn upsert_index_entry(&self, entry: EntityIndexEntry) {
        let mut index = self.index.write();
        match index.binary_search_by_key(&entry.entity_id, |e| e.entity_id) {
            Ok(pos) => index[pos] = entry,
            Err(pos) => index.insert(pos, entry),
        }
    }

    /// Snapshot of the current sorted entity index.
    pub fn index_snapshot(&self) -> Vec<EntityIndexEntry> {
        self.index.read().clone()
    }

    /// Flushes the tag dictionary and entity index sections and a
    /// refreshed header to disk. `entity_count` is recomputed here as the
    /// count of live (non-purged) entries, self-correcting any drift.
    pub fn checkpoint(&self) -> Result<()> {
        let index = self.index.read().clone();
        let live_count = index.iter().filter(|e| !e.is_purged()).count() as u64;
        let encoded_index = entity_index::encode_all(&index)?;
        let encoded_dict = crate::format::dictionary_section::encode_all(&self.dictionary.entries())?;

        let mut file = self.file.lock();
        let dict_offset = file.append(&encoded_dict)?;
        let index_offset = file.append(&encoded_index)?;
        file.refresh_header()?;
        let mut header = *file.header();
        header.dict_offset = dict_offset;
        header.dict_len = encoded_dict.len() as u64;
        header.index_offset = index_offset;
        header.index_len = encoded_index.len() as u64;
        header.entity_count = live_count;
        header.last_modified_ns = now_ns();
        header.file_size = index_offset + encoded_index.len() as u64;
        file.write_header(header)?;
        Ok(())
    }

    /// Rewrites the unified file from scratch into a sibling path,
    /// dropping tombstoned entries and reclaiming their space, then
    /// renames the new file over the old one. The previous live file is
    /// preserved at `entities_backup_<timestamp>.db` as a recovery
    /// fallback.
    pub fn compact(&self, path: &Path, backup_suffix: &str) -> Result<()> {
        let index = self.index.read().clone();
        let live: Vec<&EntityIndexEntry> = index.iter().filter(|e| !e.is_purged()).collect();

        let tmp_path = path.with_extension("db.compacting");
        let mut new_file = UnifiedFile::create(&tmp_path)?;
        let mut new_index = Vec::with_capacity(live.len());

        {
            let mut old_file = self.file.lock();
            for entry in &live {
                let bytes = old_file.read_at(entry.offset, entry.size as usize)?;
                let new_offset = new_file.append(&bytes)?;
                new_index.push(EntityIndexEntry {
                    entity_id: entry.entity_id,
                    offset: new_offset,
                    size: entry.size,
                    flags: 0,
                });
            }
        }

        let encoded_dict = crate::format::dictionary_section::encode_all(&self.dictionary.entries())?;
        let dict_offset = new_file.append(&encoded_dict)?;
        let encoded_index = entity_index::encode_all(&new_index)?;
        let index_offset = new_file.append(&encoded_index)?;
        let mut header = *new_file.header();
        header.dict_offset = dict_offset;
        header.dict_len = encoded_dict.len() as u64;
        header.index_offset = index_offset;
        header.index_len = encoded_index.len() as u64;
        header.entity_count = new_index.len() as u64;
        header.last_modified_ns = now_ns();
        header.file_size = index_offset + encoded_index.len() as u64;
        new_file.write_header(header)?;
        new_file.sync()?;
        drop(new_file);

        let backup_path = backup_path_for(path, backup_suffix);
        std::fs::rename(path, &backup_path)?;
        std::fs::rename(&tmp_path, path)?;

        let mut file = self.file.lock();
        *file = UnifiedFile::open(path)?;
        drop(file);
        *self.index.write() = new_index;
        Ok(())
    }
}

fn backup_path_for(path: &Path, suffix: &str) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("entities_backup_{suffix}.db"))
}

fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::{EntityId, Tag, TimestampNs};
    use tempfile::tempdir;

    fn make_entity(dataset: &str) -> Entity {
        Entity::new(
            EntityId::generate(),
            vec![
                Tag::new(format!("dataset:{dataset}")).unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"content".to_vec(),
            TimestampNs(1),
        )
    }

    #[test]
    fn write_then_checkpoint_persists_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        let file = UnifiedFile::create(&path).unwrap();
        let dict = Arc::new(TagDictionary::new());
        let writer = Writer::new(file, dict, Vec::new());

        let entity = make_entity("orders");
        let entry = writer.write(&entity).unwrap();
        assert_eq!(entry.entity_id, entity.id);
        writer.checkpoint().unwrap();

        assert_eq!(writer.index_snapshot().len(), 1);
    }

    #[test]
    fn tombstone_marks_entry_purged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        let file = UnifiedFile::create(&path).unwrap();
        let dict = Arc::new(TagDictionary::new());
        let writer = Writer::new(file, dict, Vec::new());

        let entity = make_entity("orders");
        writer.write(&entity).unwrap();
        writer.tombstone(&entity.id);
        let index = writer.index_snapshot();
        assert!(index[0].is_purged());
    }

    #[test]
    fn compact_drops_tombstoned_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        let file = UnifiedFile::create(&path).unwrap();
        let dict = Arc::new(TagDictionary::new());
        let writer = Writer::new(file, dict, Vec::new());

        let kept = make_entity("orders");
        let dropped = make_entity("orders");
        writer.write(&kept).unwrap();
        writer.write(&dropped).unwrap();
        writer.tombstone(&dropped.id);
        writer.checkpoint().unwrap();

        writer.compact(&path, "20260101_000000").unwrap();
        let index = writer.index_snapshot();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].entity_id, kept.id);

        let backup = dir.path().join("entities_backup_20260101_000000.db");
        assert!(backup.exists());
    }
}
