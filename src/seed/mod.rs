// src/seed/mod.rs - Datastore trait and factory for the seeding utility

use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::Arc;

use crate::config::SeedConfig;
use crate::error::{ConformanceError, Result};

pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;
pub mod plan;

pub use memory::MemoryDatastore;
#[cfg(feature = "mongo")]
pub use mongo::MongoDatastore;
pub use plan::{seed, seed_at, SeedProfile, SeedReport, ORG_SOURCES};

/// Document store the API server reads its records from
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Delete every document of `collection`, returning how many went away
    async fn remove_all(&self, collection: &str) -> Result<u64>;

    /// First document whose fields equal every field of `filter`
    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;

    /// Store `document` and return its `_id`
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson>;
}

/// Result of [`ensure_document`]
#[derive(Debug, Clone, PartialEq)]
pub enum Ensured {
    Inserted(Document),
    Reused(Document),
}

impl Ensured {
    pub fn document(&self) -> &Document {
        match self {
            Ensured::Inserted(doc) | Ensured::Reused(doc) => doc,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, Ensured::Inserted(_))
    }

    /// `_id` of the stored document
    pub fn id(&self) -> Result<&Bson> {
        self.document()
            .get("_id")
            .ok_or_else(|| ConformanceError::Datastore("stored document has no _id".to_string()))
    }
}

/// Find a document identical to `document`, inserting it first when absent
pub async fn ensure_document(store: &dyn Datastore, collection: &str, document: Document) -> Result<Ensured> {
    if let Some(found) = store.find_one(collection, document.clone()).await? {
        return Ok(Ensured::Reused(found));
    }

    store.insert_one(collection, document.clone()).await?;
    store
        .find_one(collection, document)
        .await?
        .map(Ensured::Inserted)
        .ok_or_else(|| {
            ConformanceError::Datastore(format!("inserted document missing from {}", collection))
        })
}

/// Hex form of an `_id`, matching what the API stores in reference fields
pub fn id_string(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build the datastore named by `backend` ("mongo" or "memory")
pub async fn create_datastore(config: &SeedConfig, backend: &str) -> Result<Arc<dyn Datastore>> {
    match backend {
        "memory" => {
            tracing::info!("Creating memory datastore");
            Ok(Arc::new(MemoryDatastore::preloaded()))
        }
        #[cfg(feature = "mongo")]
        "mongo" => {
            tracing::info!(database = %config.database, "Connecting to MongoDB datastore");
            let store = MongoDatastore::connect(&config.mongodb_uri, &config.database).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo"))]
        "mongo" => {
            let _ = config;
            Err(ConformanceError::Configuration(
                "MongoDB support not compiled in. Enable 'mongo' feature.".to_string(),
            ))
        }
        other => Err(ConformanceError::Configuration(format!(
            "Unknown datastore backend: {}",
            other
        ))),
    }
}
