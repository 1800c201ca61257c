//! Storage backend abstraction for the database facade.
//!
//! The facade never talks to a store directly. It hands store-native documents (filters,
//! update directives, aggregation pipelines) to a [`StoreBackend`], which executes them
//! against a named collection. Filters and stages are passed through untouched; the
//! backend's only job is to run them and report what happened.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The capability every backend provides
//! - [`StoreBackendBuilder`]: Factory trait that establishes a backend, failing fast
//!
//! # Examples
//!
//! ```ignore
//! use doctable::backend::{StoreBackend, WriteScope};
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.insert_documents(vec![doc! { "pid": "p1", "name": "Alice" }], "users").await?;
//! let outcome = backend
//!     .update_documents(doc! { "pid": "p1" }, doc! { "$set": { "name": "Alicia" } }, WriteScope::One, "users")
//!     .await?;
//! assert_eq!(outcome.modified, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};

use crate::error::DatabaseResult;

/// How many documents a write may affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteScope {
    /// At most the first matching document.
    One,
    /// Every matching document.
    Many,
}

/// Result of an update as reported by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents the filter selected.
    pub matched: u64,
    /// Documents whose content actually changed.
    pub modified: u64,
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be safe to share between tasks. The facade borrows the backend
/// for the duration of one call and never locks it; any internal synchronisation is the
/// backend's concern.
///
/// # Error Handling
///
/// Per-call failures are reported as
/// [`DatabaseError::Operation`](crate::error::DatabaseError::Operation) and are never
/// retried by the facade.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts documents into a collection, creating it if it does not exist.
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DatabaseResult<()>;

    /// Applies an update directive to the documents matching `filter`.
    ///
    /// # Arguments
    ///
    /// * `filter` - Store-native filter selecting the documents
    /// * `update` - Store-native update directive (`$set`, `$addToSet`, `$pull`, ...)
    /// * `scope` - Whether the first match or every match is updated
    /// * `collection` - The name of the collection
    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        scope: WriteScope,
        collection: &str,
    ) -> DatabaseResult<UpdateOutcome>;

    /// Deletes the documents matching `filter`, returning how many were removed.
    async fn delete_documents(&self, filter: Document, scope: WriteScope, collection: &str) -> DatabaseResult<u64>;

    /// Runs an aggregation pipeline and collects the resulting documents.
    ///
    /// A collection that does not exist behaves as empty.
    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DatabaseResult<Vec<Document>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DatabaseResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend + ?Sized,
{
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DatabaseResult<()> {
        (**self).insert_documents(documents, collection).await
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        scope: WriteScope,
        collection: &str,
    ) -> DatabaseResult<UpdateOutcome> {
        (**self)
            .update_documents(filter, update, scope, collection)
            .await
    }

    async fn delete_documents(&self, filter: Document, scope: WriteScope, collection: &str) -> DatabaseResult<u64> {
        (**self)
            .delete_documents(filter, scope, collection)
            .await
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DatabaseResult<Vec<Document>> {
        (**self).aggregate(pipeline, collection).await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DatabaseResult<()> {
        (**self).insert_documents(documents, collection).await
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        scope: WriteScope,
        collection: &str,
    ) -> DatabaseResult<UpdateOutcome> {
        (**self)
            .update_documents(filter, update, scope, collection)
            .await
    }

    async fn delete_documents(&self, filter: Document, scope: WriteScope, collection: &str) -> DatabaseResult<u64> {
        (**self)
            .delete_documents(filter, scope, collection)
            .await
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DatabaseResult<Vec<Document>> {
        (**self).aggregate(pipeline, collection).await
    }
}

#[async_trait]
impl StoreBackend for Box<dyn StoreBackend> {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DatabaseResult<()> {
        (**self).insert_documents(documents, collection).await
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        scope: WriteScope,
        collection: &str,
    ) -> DatabaseResult<UpdateOutcome> {
        (**self)
            .update_documents(filter, update, scope, collection)
            .await
    }

    async fn delete_documents(&self, filter: Document, scope: WriteScope, collection: &str) -> DatabaseResult<u64> {
        (**self)
            .delete_documents(filter, scope, collection)
            .await
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DatabaseResult<Vec<Document>> {
        (**self).aggregate(pipeline, collection).await
    }
}

/// Factory for backends.
///
/// Building is where a backend validates its configuration and proves the store is
/// reachable; once built, a backend performs no further handshakes.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DatabaseResult<Self::Backend>;
}
