//! MongoDB client wrapper
//!
//! Holds the single shared driver handle and exposes the fixed operation
//! set the gateway forwards to. The driver's own connection pool provides
//! all concurrency guarantees; nothing here locks per request.

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::StreamExt;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use tracing::{error, info};

use crate::types::{GatewayError, Result};

/// Index definition accepted by the create-collection operation
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub keys: Document,
    pub unique: bool,
    pub name: Option<String>,
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the connection with a ping
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.client.database(&self.db_name).collection(name)
    }

    /// Ping the server, used by the health endpoint
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Create a collection, optionally with an index
    pub async fn create_collection(&self, name: &str, index: Option<IndexSpec>) -> Result<()> {
        self.client
            .database(&self.db_name)
            .create_collection(name)
            .await?;

        if let Some(spec) = index {
            let options = IndexOptions::builder()
                .unique(spec.unique)
                .name(spec.name)
                .build();
            let model = IndexModel::builder()
                .keys(spec.keys)
                .options(options)
                .build();
            self.collection(name).create_index(model).await?;
        }

        Ok(())
    }

    /// Drop a collection
    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        self.collection(name).drop().await?;
        Ok(())
    }

    /// Find documents with pagination
    pub async fn find(
        &self,
        name: &str,
        filter: Document,
        sort: Option<Document>,
        skip: u64,
        limit: i64,
    ) -> Result<Vec<Document>> {
        let options = FindOptions::builder()
            .sort(sort)
            .skip(skip)
            .limit(limit)
            .build();

        let cursor = self
            .collection(name)
            .find(filter)
            .with_options(options)
            .await?;

        drain(cursor).await
    }

    /// Run an aggregation pipeline
    pub async fn aggregate(&self, name: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let cursor = self.collection(name).aggregate(pipeline).await?;
        drain(cursor).await
    }

    /// Insert one document, stamping timestamps
    pub async fn insert_one(&self, name: &str, mut document: Document) -> Result<ObjectId> {
        stamp_timestamps(&mut document);

        let result = self.collection(name).insert_one(document).await?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| GatewayError::Internal("Inserted id is not an ObjectId".to_string()))
    }

    /// Insert many documents, stamping timestamps on each
    pub async fn insert_many(&self, name: &str, mut documents: Vec<Document>) -> Result<Vec<ObjectId>> {
        for document in &mut documents {
            stamp_timestamps(document);
        }

        let result = self.collection(name).insert_many(documents).await?;

        // inserted_ids is keyed by input position; return them in that order
        let mut ids: Vec<(usize, ObjectId)> = result
            .inserted_ids
            .iter()
            .filter_map(|(idx, id)| id.as_object_id().map(|oid| (*idx, oid)))
            .collect();
        ids.sort_by_key(|(idx, _)| *idx);

        Ok(ids.into_iter().map(|(_, oid)| oid).collect())
    }

    /// Atomically update one document by id, returning the updated document
    pub async fn find_by_id_and_update(
        &self,
        name: &str,
        id: ObjectId,
        update: Document,
    ) -> Result<Option<Document>> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection(name)
            .find_one_and_update(doc! { "_id": id }, update)
            .with_options(options)
            .await?;

        Ok(updated)
    }

    /// Atomically remove one document by id, returning the removed document
    pub async fn find_by_id_and_delete(&self, name: &str, id: ObjectId) -> Result<Option<Document>> {
        let removed = self
            .collection(name)
            .find_one_and_delete(doc! { "_id": id })
            .await?;

        Ok(removed)
    }
}

/// Set created_at/updated_at on an insert payload
fn stamp_timestamps(document: &mut Document) {
    let now = DateTime::now();
    document.insert("created_at", now);
    document.insert("updated_at", now);
}

async fn drain(cursor: mongodb::Cursor<Document>) -> Result<Vec<Document>> {
    let results: Vec<Document> = cursor
        .filter_map(|item| async {
            match item {
                Ok(d) => Some(d),
                Err(e) => {
                    error!("Error reading document from cursor: {}", e);
                    None
                }
            }
        })
        .collect()
        .await;

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Operations against a live server are covered by the pure validation
    // layer in the route modules; running them here would require a MongoDB
    // instance.

    #[test]
    fn timestamps_are_stamped_on_inserts() {
        let mut document = doc! { "title": "first" };
        stamp_timestamps(&mut document);

        assert!(document.get_datetime("created_at").is_ok());
        assert!(document.get_datetime("updated_at").is_ok());
        assert_eq!(document.get_str("title").unwrap(), "first");
    }

    #[test]
    fn stamping_overwrites_client_supplied_timestamps() {
        let mut document = doc! { "created_at": "spoofed" };
        stamp_timestamps(&mut document);

        assert!(document.get_datetime("created_at").is_ok());
    }
}
