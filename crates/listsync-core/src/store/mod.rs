// # Document Store Implementations
//
// This module provides implementations of the DocumentStore trait for
// different persistence strategies. Both keep the whole database in memory
// as a `Database`; the file store additionally writes it to disk after
// every mutation.

pub mod file;
pub mod memory;

pub use file::{FileDocumentStore, FileDocumentStoreFactory};
pub use memory::{MemoryDocumentStore, MemoryDocumentStoreFactory};

use crate::traits::{Document, DuplicateGroup, Filter, ID_FIELD};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Collections by name, plus the id sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Database {
    next_id: u64,
    collections: BTreeMap<String, Vec<Document>>,
}

impl Database {
    pub(crate) fn find(&self, collection: &str) -> Vec<Document> {
        self.collections.get(collection).cloned().unwrap_or_default()
    }

    pub(crate) fn find_one(&self, collection: &str, id: &Value) -> Option<Document> {
        self.collections
            .get(collection)?
            .iter()
            .find(|doc| doc.get(ID_FIELD) == Some(id))
            .cloned()
    }

    pub(crate) fn insert_many(&mut self, collection: &str, docs: Vec<Document>) {
        let mut prepared = Vec::with_capacity(docs.len());
        for mut doc in docs {
            if !doc.contains_key(ID_FIELD) {
                self.next_id += 1;
                doc.insert(ID_FIELD.to_string(), Value::from(self.next_id));
            }
            prepared.push(doc);
        }
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(prepared);
    }

    pub(crate) fn delete_many(&mut self, collection: &str, filter: &Filter) -> u64 {
        let Some(docs) = self.collections.get_mut(collection) else {
            return 0;
        };
        let before = docs.len();
        docs.retain(|doc| !filter.matches(doc));
        (before - docs.len()) as u64
    }

    /// Returns whether anything was written
    pub(crate) fn update_one(
        &mut self,
        collection: &str,
        id: &Value,
        fields: Document,
        upsert: bool,
    ) -> bool {
        let docs = self.collections.entry(collection.to_string()).or_default();
        if let Some(doc) = docs.iter_mut().find(|doc| doc.get(ID_FIELD) == Some(id)) {
            for (key, value) in fields {
                if key != ID_FIELD {
                    doc.insert(key, value);
                }
            }
            return true;
        }
        if !upsert {
            return false;
        }

        let mut doc = Document::new();
        doc.insert(ID_FIELD.to_string(), id.clone());
        for (key, value) in fields {
            if key != ID_FIELD {
                doc.insert(key, value);
            }
        }
        docs.push(doc);
        true
    }

    pub(crate) fn group_duplicates(&self, collection: &str, key: &str) -> Vec<DuplicateGroup> {
        let Some(docs) = self.collections.get(collection) else {
            return Vec::new();
        };

        // Keyed by the JSON text of the value so any JSON type can group.
        let mut groups: IndexMap<String, DuplicateGroup> = IndexMap::new();
        for doc in docs {
            let (Some(value), Some(id)) = (doc.get(key), doc.get(ID_FIELD)) else {
                continue;
            };
            groups
                .entry(value.to_string())
                .or_insert_with(|| DuplicateGroup {
                    key: value.clone(),
                    ids: Vec::new(),
                })
                .ids
                .push(id.clone());
        }

        groups
            .into_values()
            .filter(|group| group.ids.len() > 1)
            .collect()
    }

    pub(crate) fn len(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }
}
