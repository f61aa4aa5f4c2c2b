//! Duplicate cleanup for result collections
//!
//! The pipeline already writes each value once, but two runs of the same
//! kind can interleave their deletes and inserts. This pass groups a
//! collection by its natural key and keeps the first member of each group.

use crate::config::Collections;
use crate::error::Result;
use crate::model::ListKind;
use crate::traits::{DocumentStore, Filter};
use std::sync::Arc;
use tracing::info;

/// Collapses duplicate records per list kind
pub struct Deduplicator {
    store: Arc<dyn DocumentStore>,
    collections: Collections,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn DocumentStore>, collections: Collections) -> Self {
        Self { store, collections }
    }

    /// Remove all but one record for every duplicated value of `kind`
    ///
    /// # Returns
    ///
    /// The number of records removed; `0` on an already clean collection
    pub async fn run(&self, kind: ListKind) -> Result<u64> {
        let collection = self.collections.results(kind);
        let groups = self
            .store
            .group_duplicates(collection, kind.natural_key())
            .await?;

        let mut removed = 0;
        for group in groups {
            let extra: Vec<_> = group.ids.into_iter().skip(1).collect();
            if extra.is_empty() {
                continue;
            }
            let count = self
                .store
                .delete_many(collection, &Filter::IdIn(extra))
                .await?;
            info!(
                "Removed {} duplicate(s) for {} {}",
                count, kind, group.key
            );
            removed += count;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResultRecord;
    use crate::store::MemoryDocumentStore;

    async fn seeded(values: &[(&str, &str)]) -> (MemoryDocumentStore, Deduplicator) {
        let store = MemoryDocumentStore::new();
        let docs = values
            .iter()
            .map(|(value, source)| ResultRecord::new(*value, *source).to_document(ListKind::Domain))
            .collect();
        store.insert_many("domains", docs).await.unwrap();
        let dedup = Deduplicator::new(Arc::new(store.clone()), Collections::default());
        (store, dedup)
    }

    #[tokio::test]
    async fn test_keeps_first_member_of_each_group() {
        let (store, dedup) = seeded(&[
            ("a.com", "first"),
            ("b.com", "first"),
            ("a.com", "second"),
            ("a.com", "third"),
        ])
        .await;

        assert_eq!(dedup.run(ListKind::Domain).await.unwrap(), 2);

        let records: Vec<_> = store
            .find("domains")
            .await
            .unwrap()
            .iter()
            .filter_map(|doc| ResultRecord::from_document(ListKind::Domain, doc))
            .collect();
        assert_eq!(
            records,
            vec![
                ResultRecord::new("a.com", "first"),
                ResultRecord::new("b.com", "first"),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let (store, dedup) = seeded(&[("a.com", "x"), ("a.com", "y"), ("c.com", "x")]).await;

        dedup.run(ListKind::Domain).await.unwrap();
        let after_first = store.len("domains").await;

        assert_eq!(dedup.run(ListKind::Domain).await.unwrap(), 0);
        assert_eq!(store.len("domains").await, after_first);
        assert_eq!(after_first, 2);
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let (_store, dedup) = seeded(&[]).await;
        assert_eq!(dedup.run(ListKind::Domain).await.unwrap(), 0);
    }
}
