//! The top-level facade: opens the unified file, runs crash recovery,
//! and owns the repository plus its background maintenance workers.
//!
//! Open proceeds open-then-recover-then-spawn-workers: recovery replays
//! the index snapshot, falls back to WAL/backup/quarantine on a load or
//! checksum failure, then replays any WAL tail past the snapshot before
//! maintenance threads start.

use crate::background::BackgroundWorkers;
use crate::lifecycle;
use crate::repository::{EntityStorage, GetOptions, Repository, UnifiedStorage};
use crate::temporal;
use entitydb_concurrency::CancellationToken;
use entitydb_core::{Config, Entity, EntityId, Page, QueryRequest, Result};
use entitydb_durability::{recover_entity, recovery::outcome_to_result, Op};
use std::sync::Arc;
use std::time::Duration;

/// The open database: a durable repository plus its maintenance workers.
pub struct Database {
    repo: Arc<Repository<UnifiedStorage>>,
    workers: Option<BackgroundWorkers>,
}

impl Database {
    /// Opens (creating if absent) the unified file named by `config`, runs
    /// crash recovery, and starts the checkpoint/compaction/purge worker
    /// threads.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_path)?;

        let db_path = config.database_path();
        let storage = UnifiedStorage::open(&db_path, config.reader_pool_size, 0)?;
        let repo = Arc::new(Repository::new(storage, config.clone()));

        recover(&repo)?;

        let purge_retention = config
            .lifecycle_retention
            .values()
            .copied()
            .max()
            .unwrap_or(Duration::from_secs(0));
        let workers = BackgroundWorkers::spawn(repo.clone(), purge_retention);

        Ok(Database {
            repo,
            workers: Some(workers),
        })
    }

    /// Shuts down the background workers and waits for any in-flight
    /// checkpoint to finish before returning.
    pub fn close(mut self) {
        if let Some(workers) = self.workers.take() {
            workers.shutdown();
        }
    }

    pub fn create(&self, entity: Entity, token: &CancellationToken) -> Result<Entity> {
        self.repo.create(entity, token)
    }

    pub fn get(&self, id: &EntityId, options: GetOptions, token: &CancellationToken) -> Result<Entity> {
        self.repo.get_by_id(id, options, token)
    }

    pub fn update(&self, entity: Entity, token: &CancellationToken) -> Result<Entity> {
        self.repo.update(entity, token)
    }

    /// Atomically appends tags to an existing entity without requiring the
    /// caller to read-modify-write a whole replacement entity; see
    /// `Repository::append_tags`.
    pub fn append_tags(&self, id: &EntityId, tags: Vec<entitydb_core::Tag>, token: &CancellationToken) -> Result<Entity> {
        self.repo.append_tags(id, tags, token)
    }

    pub fn delete(&self, id: &EntityId, token: &CancellationToken) -> Result<()> {
        self.repo.delete(id, token)
    }

    pub fn query(&self, request: &QueryRequest, global_admin: bool, token: &CancellationToken) -> Result<Page<Entity>> {
        self.repo.query(request, global_admin, token)
    }

    pub fn soft_delete(
        &self,
        id: &EntityId,
        user_id: &str,
        reason: &str,
        policy: &str,
        token: &CancellationToken,
    ) -> Result<Entity> {
        lifecycle::soft_delete(&self.repo, id, user_id, reason, policy, token)
    }

    pub fn undelete(&self, id: &EntityId, token: &CancellationToken) -> Result<Entity> {
        lifecycle::undelete(&self.repo, id, token)
    }

    pub fn archive(&self, id: &EntityId, token: &CancellationToken) -> Result<Entity> {
        lifecycle::archive(&self.repo, id, token)
    }

    pub fn purge(&self, id: &EntityId, token: &CancellationToken) -> Result<()> {
        lifecycle::purge(&self.repo, id, token)
    }

    pub fn as_of(&self, id: &EntityId, t: entitydb_core::TimestampNs, token: &CancellationToken) -> Result<Vec<entitydb_core::Tag>> {
        let entity = self.repo.get_by_id(id, GetOptions::full(), token)?;
        Ok(temporal::as_of(&entity, t))
    }

    pub fn history(
        &self,
        id: &EntityId,
        from: Option<entitydb_core::TimestampNs>,
        to: Option<entitydb_core::TimestampNs>,
        token: &CancellationToken,
    ) -> Result<Vec<(entitydb_core::TimestampNs, entitydb_core::Tag)>> {
        let entity = self.repo.get_by_id(id, GetOptions::full(), token)?;
        Ok(temporal::history(&entity, from, to))
    }

    pub fn diff(
        &self,
        id: &EntityId,
        t1: entitydb_core::TimestampNs,
        t2: entitydb_core::TimestampNs,
        token: &CancellationToken,
    ) -> Result<temporal::Diff> {
        let entity = self.repo.get_by_id(id, GetOptions::full(), token)?;
        temporal::diff(&entity, t1, t2)
    }

    pub fn checkpoint(&self) -> Result<()> {
        self.repo.checkpoint()
    }

    pub fn request_checkpoint(&self) {
        if let Some(workers) = &self.workers {
            workers.request_checkpoint();
        }
    }

    pub fn request_compaction(&self) {
        if let Some(workers) = &self.workers {
            workers.request_compaction();
        }
    }

    pub fn repair_indexes(&self) {
        self.repo.repair_indexes();
    }

    pub fn entity_count(&self) -> usize {
        self.repo.entity_count()
    }
}

/// Reconstructs the in-memory entity map and tag indices on open: every
/// live index entry is loaded from disk, then the WAL tail is replayed on
/// top (it may carry creates/updates/deletes newer than the last
/// checkpoint's index snapshot). An entry that fails checksum
/// verification goes through `recover_entity`'s WAL/backup/quarantine
/// chain instead of being dropped silently.
fn recover(repo: &Repository<UnifiedStorage>) -> Result<()> {
    // Recovery must run to completion before the database accepts calls;
    // there's no external caller to cancel it.
    let token = CancellationToken::never();
    let storage = repo_storage(repo);
    let index = storage.writer().index_snapshot();

    for entry in index.iter().filter(|e| !e.is_purged()) {
        match storage.load(&entry.entity_id) {
            Ok(Some(entity)) => {
                repo.reindex_recovered(entity);
            }
            _ => {
                let backups = compaction_backup_paths(storage.path());
                let outcome = recover_entity(
                    &entry.entity_id,
                    storage.wal(),
                    &backups,
                    storage.dictionary(),
                )?;
                match outcome_to_result(outcome) {
                    Ok(entity) => repo.reindex_recovered(entity),
                    Err(_) => repo.quarantine(entry.entity_id),
                }
            }
        }
    }

    let records = storage.wal().replay(0)?;
    let mut max_lsn = 0u64;
    for record in &records {
        max_lsn = max_lsn.max(record.lsn);
        match record.op {
            Op::Create | Op::Update => {
                if let Ok(entity) = record.decode_entity() {
                    repo.reindex_recovered(entity);
                }
            }
            Op::Delete => {
                let _ = repo.delete(&record.entity_id, &token);
            }
        }
    }
    if !records.is_empty() {
        storage.wal().set_next_lsn(max_lsn + 1);
    }

    if entitydb_storage::compaction::should_compact(&index, 0.5) {
        tracing::info!("recovered index exceeds tombstone ratio; scheduling compaction");
    }

    Ok(())
}

fn repo_storage(repo: &Repository<UnifiedStorage>) -> &UnifiedStorage {
    // `Repository` doesn't expose its backend publicly (the `EntityStorage`
    // trait surface is intentionally narrower than what recovery needs),
    // so recovery reaches it through this crate-internal accessor.
    repo.storage_for_recovery()
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitydb_core::{Tag, TimestampNs};
    use tempfile::tempdir;

    fn order_entity() -> Entity {
        Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            b"payload".to_vec(),
            TimestampNs::now(),
        )
    }

    #[test]
    fn open_create_close_then_reopen_recovers_entity() {
        let dir = tempdir().unwrap();
        let config = Config::builder(dir.path()).build().unwrap();

        let created_id = {
            let db = Database::open(config.clone()).unwrap();
            let created = db.create(order_entity(), &CancellationToken::never()).unwrap();
            db.checkpoint().unwrap();
            db.close();
            created.id
        };

        let db = Database::open(config).unwrap();
        let fetched = db.get(&created_id, GetOptions::full(), &CancellationToken::never()).unwrap();
        assert_eq!(fetched.id, created_id);
        db.close();
    }
}

fn compaction_backup_paths(db_path: &std::path::Path) -> Vec<std::path::PathBuf> {
    let dir = db_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let mut backups: Vec<std::path::PathBuf> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("entities_backup_") && n.ends_with(".db"))
                .unwrap_or(false)
        })
        .collect();
    backups.sort();
    backups.reverse();
    backups
}
