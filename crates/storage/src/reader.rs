//! Reads entity records back off disk, resolving tag ids through the
//! dictionary and verifying the stored checksum tag.

use crate::dictionary::TagDictionary;
use crate::format::entity_index::{self, EntityIndexEntry};
use crate::format::{DataRecord, UnifiedFile};
use entitydb_core::{Entity, EntityId, Error, Result, TemporalTag};
use std::path::Path;
use std::sync::Arc;

/// Reads entities from a unified file given a snapshot of its entity
/// index and a shared tag dictionary.
pub struct Reader {
    file: UnifiedFile,
    dictionary: Arc<TagDictionary>,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>, dictionary: Arc<TagDictionary>) -> Result<Self> {
        let file = UnifiedFile::open(path)?;
        Ok(Reader { file, dictionary })
    }

    /// Reads one entity given its index entry.
    pub fn read_entity(&mut self, entry: &EntityIndexEntry) -> Result<Entity> {
        if entry.is_purged() {
            return Err(Error::NotFound(entry.entity_id.to_string()));
        }
        let bytes = self.file.read_at(entry.offset, entry.size as usize)?;
        let record = DataRecord::read_from(&bytes[..])?;
        let mut tags = Vec::with_capacity(record.tag_ids.len());
        for id in &record.tag_ids {
            let wire = self.dictionary.resolve(*id).ok_or_else(|| {
                Error::CorruptHeader(format!("dangling tag id {id} for entity {}", entry.entity_id))
            })?;
            let tt: TemporalTag = wire.parse()?;
            tags.push(tt);
        }
        let created_at = tags.iter().map(|t| t.timestamp).min().unwrap_or_default();
        let updated_at = tags
            .iter()
            .map(|t| t.timestamp)
            .max()
            .unwrap_or(created_at);
        Ok(Entity {
            id: entry.entity_id,
            tags,
            content: record.content,
            created_at,
            updated_at,
        })
    }

    /// Looks up an entity by id in `index`, then reads it.
    pub fn read_by_id(&mut self, index: &[EntityIndexEntry], id: &EntityId) -> Result<Entity> {
        let pos = entity_index::find(index, id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.read_entity(&index[pos])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::Writer;
    use entitydb_core::{Tag, TimestampNs};
    use tempfile::tempdir;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.db");
        let dict = Arc::new(TagDictionary::new());

        let file = UnifiedFile::create(&path).unwrap();
        let writer = Writer::new(file, dict.clone(), Vec::new());
        let entity = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"hello world".to_vec(),
            TimestampNs(100),
        );
        let entry = writer.write(&entity).unwrap();
        writer.checkpoint().unwrap();
        drop(writer);

        let mut reader = Reader::open(&path, dict).unwrap();
        let read_back = reader.read_entity(&entry).unwrap();
        assert_eq!(read_back.content, entity.content);
        assert_eq!(read_back.id, entity.id);
    }
}
