//! Contract Test: Duplicate Cleanup Idempotency
//!
//! Constraints verified:
//! - After a cleanup no natural key appears twice in any result collection
//! - The first record of each group (store order) survives
//! - A second cleanup changes nothing
//! - Cleanup works the same through the file store

mod common;

use common::*;
use listsync_core::config::Collections;
use listsync_core::store::{FileDocumentStore, MemoryDocumentStore};
use listsync_core::traits::DocumentStore;
use listsync_core::{Deduplicator, ListKind, ResultRecord};
use std::sync::Arc;
use tokio_test::assert_ok;

async fn seed(store: &dyn DocumentStore, kind: ListKind, values: &[(&str, &str)]) {
    let docs = values
        .iter()
        .map(|(value, source)| ResultRecord::new(*value, *source).to_document(kind))
        .collect();
    store
        .insert_many(Collections::default().results(kind), docs)
        .await
        .unwrap();
}

#[tokio::test]
async fn cleanup_is_idempotent_for_every_kind() {
    let store = MemoryDocumentStore::new();
    seed(
        &store,
        ListKind::Ip,
        &[("1.1.1.1", "A"), ("8.8.8.8", "A"), ("1.1.1.1", "B")],
    )
    .await;
    seed(
        &store,
        ListKind::Domain,
        &[("a.com", "A"), ("a.com", "B"), ("a.com", "C")],
    )
    .await;
    seed(&store, ListKind::Url, &[("http://a.com/x", "A")]).await;

    let dedup = Deduplicator::new(Arc::new(store.clone()), Collections::default());

    let removed_ip = assert_ok!(dedup.run(ListKind::Ip).await);
    let removed_domain = assert_ok!(dedup.run(ListKind::Domain).await);
    let removed_url = assert_ok!(dedup.run(ListKind::Url).await);
    assert_eq!((removed_ip, removed_domain, removed_url), (1, 2, 0));

    let ips = records(&store, ListKind::Ip).await;
    let domains = records(&store, ListKind::Domain).await;
    let urls = records(&store, ListKind::Url).await;

    for kind in ListKind::ALL {
        assert_eq!(assert_ok!(dedup.run(kind).await), 0, "{} second pass", kind);
    }

    assert_eq!(records(&store, ListKind::Ip).await, ips);
    assert_eq!(records(&store, ListKind::Domain).await, domains);
    assert_eq!(records(&store, ListKind::Url).await, urls);

    assert_eq!(
        ips,
        vec![
            ResultRecord::new("1.1.1.1", "A"),
            ResultRecord::new("8.8.8.8", "A"),
        ]
    );
    assert_eq!(domains, vec![ResultRecord::new("a.com", "A")]);
}

#[tokio::test]
async fn cleanup_persists_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checker.json");

    {
        let store = FileDocumentStore::new(&path).await.unwrap();
        seed(
            &store,
            ListKind::Domain,
            &[("x.org", "A"), ("y.org", "A"), ("x.org", "B")],
        )
        .await;
        let dedup = Deduplicator::new(Arc::new(store), Collections::default());
        assert_eq!(assert_ok!(dedup.run(ListKind::Domain).await), 1);
    }

    let reopened = FileDocumentStore::new(&path).await.unwrap();
    assert_eq!(
        records(&reopened, ListKind::Domain).await,
        vec![
            ResultRecord::new("x.org", "A"),
            ResultRecord::new("y.org", "A"),
        ]
    );

    let dedup = Deduplicator::new(Arc::new(reopened), Collections::default());
    assert_eq!(assert_ok!(dedup.run(ListKind::Domain).await), 0);
}
