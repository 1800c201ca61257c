//! Named collection handles.
//!
//! A [`Collection`] pairs a collection name with a borrowed backend. Names are free-form:
//! any string is accepted and a collection that does not exist yet is created by the
//! store on first write and reads as empty until then.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! let users = database.collection("users");
//! let docs = users.aggregate(vec![doc! { "$match": { "role": "dev" } }]).await?;
//! ```

use bson::Document;

use crate::{
    backend::{StoreBackend, UpdateOutcome, WriteScope},
    error::DatabaseResult,
};

/// A collection name bound to a storage backend.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend reference
/// * `B` - The storage backend type
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Inserts already-stamped documents.
    pub async fn insert(&self, documents: Vec<Document>) -> DatabaseResult<()> {
        self.backend
            .insert_documents(documents, self.name())
            .await
    }

    /// Applies `update` to the first document matching `filter`.
    pub async fn update_one(&self, filter: Document, update: Document) -> DatabaseResult<UpdateOutcome> {
        self.backend
            .update_documents(filter, update, WriteScope::One, self.name())
            .await
    }

    /// Applies `update` to every document matching `filter`.
    pub async fn update_many(&self, filter: Document, update: Document) -> DatabaseResult<UpdateOutcome> {
        self.backend
            .update_documents(filter, update, WriteScope::Many, self.name())
            .await
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one(&self, filter: Document) -> DatabaseResult<u64> {
        self.backend
            .delete_documents(filter, WriteScope::One, self.name())
            .await
    }

    /// Deletes every document matching `filter`.
    pub async fn delete_many(&self, filter: Document) -> DatabaseResult<u64> {
        self.backend
            .delete_documents(filter, WriteScope::Many, self.name())
            .await
    }

    /// Runs an aggregation pipeline against this collection.
    pub async fn aggregate(&self, pipeline: Vec<Document>) -> DatabaseResult<Vec<Document>> {
        self.backend
            .aggregate(pipeline, self.name())
            .await
    }
}
