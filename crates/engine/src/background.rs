//! Background maintenance workers: checkpoint, compaction, and purge of
//! soft-deleted entities past their retention window.
//!
//! Three fixed, bounded `std::sync::mpsc::sync_channel` queues, one per
//! task kind, each serviced by its own thread — there's no need for
//! priority ordering between checkpoint, compaction, and purge.

use crate::lifecycle;
use crate::repository::{EntityStorage, Repository};
use entitydb_concurrency::CancellationToken;
use entitydb_core::EntityId;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const CHANNEL_CAPACITY: usize = 256;

pub enum MaintenanceTask {
    CheckpointRequested,
    CompactRequested,
    PurgeCandidate(EntityId),
}

/// Handle to the three maintenance worker threads. Dropping it signals
/// the workers to stop by closing the channels, then joins them.
pub struct BackgroundWorkers {
    checkpoint_tx: SyncSender<()>,
    compact_tx: SyncSender<()>,
    purge_tx: SyncSender<EntityId>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundWorkers {
    pub fn spawn<S>(repo: Arc<Repository<S>>, purge_retention: Duration) -> Self
    where
        S: EntityStorage + 'static,
    {
        let (checkpoint_tx, checkpoint_rx) = sync_channel::<()>(CHANNEL_CAPACITY);
        let (compact_tx, compact_rx) = sync_channel::<()>(CHANNEL_CAPACITY);
        let (purge_tx, purge_rx) = sync_channel::<EntityId>(CHANNEL_CAPACITY);

        let mut handles = Vec::with_capacity(3);
        handles.push(spawn_checkpoint_worker(repo.clone(), checkpoint_rx));
        handles.push(spawn_compact_worker(repo.clone(), compact_rx));
        handles.push(spawn_purge_worker(repo, purge_rx, purge_retention));

        BackgroundWorkers {
            checkpoint_tx,
            compact_tx,
            purge_tx,
            handles,
        }
    }

    /// Enqueues a checkpoint request; silently dropped if the channel is
    /// full, since a checkpoint already in flight will cover it.
    pub fn request_checkpoint(&self) {
        let _ = self.checkpoint_tx.try_send(());
    }

    pub fn request_compaction(&self) {
        let _ = self.compact_tx.try_send(());
    }

    pub fn submit_purge_candidate(&self, id: EntityId) {
        let _ = self.purge_tx.try_send(id);
    }

    /// Closes the task channels and blocks until every worker observes
    /// the close and exits its loop.
    pub fn shutdown(self) {
        drop(self.checkpoint_tx);
        drop(self.compact_tx);
        drop(self.purge_tx);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn spawn_checkpoint_worker<S>(repo: Arc<Repository<S>>, rx: Receiver<()>) -> JoinHandle<()>
where
    S: EntityStorage + 'static,
{
    std::thread::spawn(move || {
        for () in rx.iter() {
            if let Err(err) = repo.checkpoint() {
                tracing::warn!(error = %err, "background checkpoint failed");
            }
        }
    })
}

fn spawn_compact_worker<S>(repo: Arc<Repository<S>>, rx: Receiver<()>) -> JoinHandle<()>
where
    S: EntityStorage + 'static,
{
    std::thread::spawn(move || {
        for () in rx.iter() {
            repo.repair_indexes();
        }
    })
}

fn spawn_purge_worker<S>(
    repo: Arc<Repository<S>>,
    rx: Receiver<EntityId>,
    retention: Duration,
) -> JoinHandle<()>
where
    S: EntityStorage + 'static,
{
    std::thread::spawn(move || {
        // Background purge has no external caller to cancel it; it always
        // runs to completion once its retention sleep elapses.
        let token = CancellationToken::never();
        for id in rx.iter() {
            std::thread::sleep(retention);
            match lifecycle::purge(&repo, &id, &token) {
                Ok(()) => tracing::info!(entity_id = %id, "purged soft-deleted entity"),
                Err(err) => tracing::warn!(entity_id = %id, error = %err, "purge candidate failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStorage;
    use entitydb_core::{Config, Entity, Tag, TimestampNs};

    fn test_repo() -> Arc<Repository<InMemoryStorage>> {
        let config = Config::builder("/tmp/entitydb-background-tests").build().unwrap();
        Arc::new(Repository::new(InMemoryStorage::default(), config))
    }

    #[test]
    fn checkpoint_request_is_processed_without_panicking() {
        let repo = test_repo();
        let workers = BackgroundWorkers::spawn(repo, Duration::from_secs(0));
        workers.request_checkpoint();
        workers.shutdown();
    }

    #[test]
    fn purge_candidate_removes_entity() {
        let repo = test_repo();
        let entity = Entity::new(
            EntityId::generate(),
            vec![
                Tag::new("dataset:orders").unwrap(),
                Tag::new("type:order").unwrap(),
            ],
            vec![],
            TimestampNs::now(),
        );
        let created = repo.create(entity, &CancellationToken::never()).unwrap();
        let workers = BackgroundWorkers::spawn(repo.clone(), Duration::from_secs(0));
        workers.submit_purge_candidate(created.id);
        workers.shutdown();
        assert!(repo
            .get_by_id(&created.id, crate::repository::GetOptions::default(), &CancellationToken::never())
            .is_err());
    }
}
