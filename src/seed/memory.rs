// src/seed/memory.rs - In-memory datastore for tests and dry runs

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use super::Datastore;
use crate::error::Result;

/// Collections of documents keyed by collection name
#[derive(Clone, Default)]
pub struct MemoryDatastore {
    collections: Arc<DashMap<String, Vec<Document>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the records a fresh API deployment already has:
    /// the content types and the `root` superuser
    pub fn preloaded() -> Self {
        let store = Self::new();
        for model in ["organization", "source"] {
            store.push(
                "django_content_type",
                doc! { "_id": ObjectId::new(), "app_label": format!("{}s", model), "model": model },
            );
        }
        store.push(
            "auth_user",
            doc! { "_id": ObjectId::new(), "username": "root", "is_staff": true, "is_superuser": true },
        );
        store
    }

    /// Snapshot of one collection in insertion order
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| docs.value().clone())
            .unwrap_or_default()
    }

    /// Names of the non-empty collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    fn push(&self, collection: &str, document: Document) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(key, value)| document.get(key) == Some(value))
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn remove_all(&self, collection: &str) -> Result<u64> {
        let removed = self
            .collections
            .get_mut(collection)
            .map(|mut docs| {
                let count = docs.len() as u64;
                docs.clear();
                count
            })
            .unwrap_or(0);
        debug!(collection = %collection, removed = removed, "Removed documents");
        Ok(removed)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|doc| matches_filter(doc, &filter))
                .cloned()
        }))
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Bson> {
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert("_id", id.clone());
                id
            }
        };
        self.push(collection, document);
        Ok(id)
    }
}
