// src/seed/mongo.rs - MongoDB datastore

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use mongodb::{Client, Database};
use tracing::debug;

use super::Datastore;
use crate::error::Result;

pub struct MongoDatastore {
    database: Database,
}

impl MongoDatastore {
    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let database = client.database(database);
        database.run_command(doc! { "ping": 1 }).await?;
        debug!(database = %database.name(), "Connected to MongoDB");
        Ok(Self { database })
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection::<Document>(name)
    }
}

#[async_trait]
impl Datastore for MongoDatastore {
    async fn remove_all(&self, collection: &str) -> Result<u64> {
        let result = self.collection(collection).delete_many(doc! {}).await?;
        debug!(collection = %collection, removed = result.deleted_count, "Removed documents");
        Ok(result.deleted_count)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).await?)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson> {
        let result = self.collection(collection).insert_one(document).await?;
        Ok(result.inserted_id)
    }
}
