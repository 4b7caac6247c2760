use chrono::{Duration, TimeZone, Utc};
use parley_persist::{
    LogStore, MemoryStorage, Message, PaginationService, PersistClient, StorageEngine,
};
use std::collections::HashSet;
use std::sync::Arc;

fn at(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
}

/// A scrambled thread: unsequenced rows, colliding sequences, a duplicate id
async fn scrambled(storage: &MemoryStorage) {
    let rows = vec![
        Message::user("t", "u1").with_id("u1").with_timestamp(at(0)).with_sequence(4),
        Message::assistant("t", "b1").with_id("b1").with_timestamp(at(3)).with_sequence(4),
        Message::user("t", "u2").with_id("u2").with_timestamp(at(60)),
        Message::assistant("t", "b2").with_id("b2").with_timestamp(at(61)).with_sequence(1),
        Message::user("t", "u2 stale").with_id("u2").with_timestamp(at(50)).with_sequence(9),
        Message::assistant("t", "[Media ID: m1]").with_id("m").with_timestamp(at(62)),
    ];
    for row in rows {
        storage.insert_raw(row).await;
    }
}

#[tokio::test]
async fn test_repair_produces_dense_unique_sequences() {
    let storage = Arc::new(MemoryStorage::new());
    scrambled(&storage).await;
    let log = LogStore::new(storage.clone());

    let report = log.repair("t").await.unwrap();
    assert_eq!(report.duplicates_removed, 1);

    let rows = storage.list_messages("t").await.unwrap();
    assert_eq!(rows.len(), 5);
    let ids: HashSet<_> = rows.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 5);

    let mut seqs: Vec<_> = rows.iter().filter_map(|m| m.sequence).collect();
    seqs.sort();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);

    let ordered: Vec<_> = log
        .list_all("t")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(ordered, vec!["u1", "b1", "u2", "b2", "[Media ID: m1]"]);
}

#[tokio::test]
async fn test_repair_is_idempotent() {
    let storage = Arc::new(MemoryStorage::new());
    scrambled(&storage).await;
    let log = LogStore::new(storage.clone());

    log.repair("t").await.unwrap();
    let first: Vec<_> = log.list_all("t").await.unwrap();
    let again = log.repair("t").await.unwrap();
    let second: Vec<_> = log.list_all("t").await.unwrap();

    assert_eq!(again.renumbered, 0);
    assert_eq!(again.duplicates_removed, 0);
    let key = |rows: &[Message]| -> Vec<(String, Option<u64>)> {
        rows.iter().map(|m| (m.id.clone(), m.sequence)).collect()
    };
    assert_eq!(key(&first), key(&second));
}

#[tokio::test]
async fn test_repair_is_deterministic_across_storage_order() {
    let forward = Arc::new(MemoryStorage::new());
    scrambled(&forward).await;

    let backward = Arc::new(MemoryStorage::new());
    let mut rows = forward.list_messages("t").await.unwrap();
    rows.reverse();
    for row in rows {
        backward.insert_raw(row).await;
    }

    let a = LogStore::new(forward).repair("t").await.unwrap();
    let b = LogStore::new(backward).repair("t").await.unwrap();
    let ids = |rows: &[Message]| rows.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&a.ordered), ids(&b.ordered));
}

#[tokio::test]
async fn test_appends_are_strictly_increasing() {
    let client = PersistClient::in_memory();
    let mut last = 0;
    for i in 0..10 {
        let message = if i % 2 == 0 {
            Message::user("t", format!("q{}", i))
        } else {
            Message::assistant("t", format!("a{}", i))
        };
        let stored = client.log().append("t", message).await.unwrap();
        let seq = stored.sequence.unwrap();
        assert!(seq > last);
        last = seq;
    }
    assert_eq!(last, 10);
}

#[tokio::test]
async fn test_pagination_visits_every_content_bearing_message_once() {
    let storage = Arc::new(MemoryStorage::new());
    scrambled(&storage).await;
    let log = Arc::new(LogStore::new(storage.clone()));
    let pages = PaginationService::new(storage, log.clone());

    let mut seen = Vec::new();
    let mut page = pages.load_initial("t", 2).await.unwrap();
    loop {
        let mut ids: Vec<_> = page.messages.iter().map(|m| m.id.clone()).collect();
        ids.append(&mut seen);
        seen = ids;
        match (page.has_more, page.cursor) {
            (true, Some(cursor)) => page = pages.load_older("t", cursor, 2).await.unwrap(),
            _ => break,
        }
    }

    assert_eq!(seen, vec!["u1", "b1", "u2", "b2"]);
}
