//! End-to-end scenarios exercising `Database` as a whole: indexing,
//! temporal as-of queries, crash recovery, content chunking, lifecycle
//! transitions, and concurrent tag appends.

use entitydb::{
    CancellationToken, Config, Database, Dataset, Entity, EntityGetOptions, EntityId, Error,
    QueryRequest, Tag, TimestampNs,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn open_db(path: &std::path::Path) -> Database {
    let config = Config::builder(path).build().unwrap();
    Database::open(config).unwrap()
}

fn note(tags: Vec<&str>, content: &[u8]) -> Entity {
    Entity::new(
        EntityId::generate(),
        tags.into_iter().map(|t| Tag::new(t).unwrap()).collect(),
        content.to_vec(),
        TimestampNs::now(),
    )
}

fn token() -> CancellationToken {
    CancellationToken::never()
}

fn tag_query(tag: &str, dataset: &str) -> QueryRequest {
    QueryRequest {
        predicates: vec![Tag::new(tag).unwrap()],
        dataset: Some(Dataset::new(dataset)),
        ..QueryRequest::default()
    }
}

#[test]
fn scenario_1_list_by_tag_reflects_status() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let created = db
        .create(
            note(
                vec!["type:test", "dataset:default", "status:open"],
                b"hi",
            ),
            &token(),
        )
        .unwrap();

    let open_page = db
        .query(&tag_query("status:open", "default"), false, &token())
        .unwrap();
    assert!(open_page.items.iter().any(|e| e.id == created.id));

    let closed_page = db
        .query(&tag_query("status:closed", "default"), false, &token())
        .unwrap();
    assert!(!closed_page.items.iter().any(|e| e.id == created.id));

    db.close();
}

#[test]
fn scenario_2_as_of_straddles_the_update() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let created = db
        .create(
            note(
                vec!["type:test", "dataset:default", "status:open"],
                b"hi",
            ),
            &token(),
        )
        .unwrap();

    thread::sleep(Duration::from_millis(5));
    let t_before = TimestampNs::now();
    thread::sleep(Duration::from_millis(5));

    let mut updated = db.get(&created.id, EntityGetOptions::full(), &token()).unwrap();
    updated.append_tags(vec![Tag::new("status:closed").unwrap()], TimestampNs::now());
    db.update(updated, &token()).unwrap();

    thread::sleep(Duration::from_millis(5));
    let t_after = TimestampNs::now();

    let before_tags = db.as_of(&created.id, t_before, &token()).unwrap();
    assert!(before_tags.contains(&Tag::new("status:open").unwrap()));
    assert!(!before_tags.contains(&Tag::new("status:closed").unwrap()));

    let after_tags = db.as_of(&created.id, t_after, &token()).unwrap();
    assert!(after_tags.contains(&Tag::new("status:closed").unwrap()));
    assert!(!after_tags.contains(&Tag::new("status:open").unwrap()));

    db.close();
}

#[test]
fn scenario_3_restart_without_checkpoint_recovers_both_entities() {
    let dir = tempdir().unwrap();
    let config = Config::builder(dir.path()).build().unwrap();

    let (first_id, second_id) = {
        let db = Database::open(config.clone()).unwrap();
        let first = db
            .create(note(vec!["type:test", "dataset:default"], b"one"), &token())
            .unwrap();
        let second = db
            .create(note(vec!["type:test", "dataset:default"], b"two"), &token())
            .unwrap();
        // No checkpoint() call: simulates the process dying with only the
        // WAL on disk, never folded into the data section.
        (first.id, second.id)
    };

    let db = Database::open(config).unwrap();
    assert!(db.get(&first_id, EntityGetOptions::default(), &token()).is_ok());
    assert!(db.get(&second_id, EntityGetOptions::default(), &token()).is_ok());

    let page = db
        .query(&tag_query("type:test", "default"), false, &token())
        .unwrap();
    assert!(page.items.iter().any(|e| e.id == first_id));
    assert!(page.items.iter().any(|e| e.id == second_id));

    db.close();
}

#[test]
fn scenario_4_large_content_is_chunked_and_rehydrates() {
    let dir = tempdir().unwrap();
    let config = Config::builder(dir.path())
        .chunk_threshold_bytes(4 * 1024 * 1024)
        .build()
        .unwrap();
    let db = Database::open(config).unwrap();

    let original: Vec<u8> = (0..10 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let created = db
        .create(note(vec!["type:document", "dataset:default"], &original), &token())
        .unwrap();

    assert!(created
        .current_tags()
        .iter()
        .any(|t| t.as_str() == "content:chunks:3"));

    let fetched = db.get(&created.id, EntityGetOptions::full(), &token()).unwrap();
    assert_eq!(fetched.content, original);

    let without_content = db.get(&created.id, EntityGetOptions::default(), &token()).unwrap();
    assert!(without_content.content.is_empty());

    db.close();
}

#[test]
fn scenario_5_soft_delete_archive_then_undelete_conflicts() {
    let dir = tempdir().unwrap();
    let db = open_db(dir.path());

    let created = db
        .create(note(vec!["type:order", "dataset:orders"], b""), &token())
        .unwrap();

    db.soft_delete(&created.id, "alice", "cleanup", "manual", &token())
        .unwrap();
    db.archive(&created.id, &token()).unwrap();

    let err = db.undelete(&created.id, &token()).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    db.close();
}

#[test]
fn scenario_6_concurrent_writers_append_distinct_tags() {
    let dir = tempdir().unwrap();
    let db = Arc::new(open_db(dir.path()));

    let created = db
        .create(note(vec!["type:counter", "dataset:default"], b""), &token())
        .unwrap();
    thread::sleep(Duration::from_millis(2));
    let watermark = TimestampNs::now();
    thread::sleep(Duration::from_millis(2));

    let handles: Vec<_> = (0..100)
        .map(|i| {
            let db = db.clone();
            let id = created.id;
            thread::spawn(move || {
                db.append_tags(&id, vec![Tag::new(format!("writer:{i}:done")).unwrap()], &token())
                    .unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let fetched = db.get(&created.id, EntityGetOptions::full(), &token()).unwrap();
    for i in 0..100 {
        assert!(fetched
            .current_tags()
            .iter()
            .any(|t| t.as_str() == format!("writer:{i}:done")));
    }

    // Every write also stamps a fresh `checksum:sha256:*` tag, so history
    // carries 200 raw entries in this window; scope the assertion to the
    // 100 events the writers themselves produced.
    let history: Vec<_> = db
        .history(&created.id, Some(watermark), None, &token())
        .unwrap()
        .into_iter()
        .filter(|(_, tag)| tag.as_str().starts_with("writer:"))
        .collect();
    assert_eq!(history.len(), 100);
    assert!(history.windows(2).all(|w| w[0].0 < w[1].0));

    if let Ok(db) = Arc::try_unwrap(db) {
        db.close();
    }
}
