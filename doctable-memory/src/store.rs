//! In-memory storage implementation for the database facade.
//!
//! This module provides a store that keeps every collection as an insertion-ordered list
//! of BSON documents behind an async-safe read-write lock, and executes filters, update
//! directives and aggregation pipelines the way a document store would.

use std::sync::Arc;
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::Document;
use tracing::debug;

use doctable_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome, WriteScope},
    error::DatabaseResult,
};

use crate::{
    aggregate::{Collections, PipelineRunner},
    evaluator::DocumentEvaluator,
    update::apply_update,
};


/// Thread-safe in-memory document storage backend.
///
/// This struct implements the [`StoreBackend`] trait to provide a fully functional
/// document store that operates entirely in memory using async-aware read-write locks.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data. Each write holds the lock for its whole duration,
/// so a multi-document update is atomic with respect to other callers.
///
/// # Performance
///
/// Every filter scans the whole collection (no indexing). This is intended for tests and
/// small datasets; use the MongoDB backend for anything else.
///
/// # Example
///
/// ```ignore
/// use doctable_memory::InMemoryStore;
/// use doctable::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     store.insert_documents(vec![doc! { "pid": "p1", "name": "Alice" }], "users").await?;
///
///     let docs = store.aggregate(vec![doc! { "$match": { "name": "Alice" } }], "users").await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents, in insertion order
    store: Arc<RwLock<Collections>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Collections::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// ```ignore
    /// use doctable_memory::InMemoryStore;
    ///
    /// let store = InMemoryStore::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the names of the collections that have received a write.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        names.sort();
        names
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DatabaseResult<()> {
        let mut store = self.store.write().await;

        store
            .entry(collection.to_string())
            .or_default()
            .extend(documents);

        Ok(())
    }

    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        scope: WriteScope,
        collection: &str,
    ) -> DatabaseResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(documents) => documents,
            None => return Ok(UpdateOutcome::default()),
        };

        let mut outcome = UpdateOutcome::default();

        for document in documents.iter_mut() {
            if !DocumentEvaluator::new(document).matches(&filter)? {
                continue;
            }

            outcome.matched += 1;

            let mut updated = document.clone();
            apply_update(&mut updated, &update)?;

            if updated != *document {
                *document = updated;
                outcome.modified += 1;
            }

            if scope == WriteScope::One {
                break;
            }
        }

        debug!(collection, matched = outcome.matched, modified = outcome.modified, "memory update");
        Ok(outcome)
    }

    async fn delete_documents(&self, filter: Document, scope: WriteScope, collection: &str) -> DatabaseResult<u64> {
        let mut store = self.store.write().await;
        let documents = match store.get_mut(collection) {
            Some(documents) => documents,
            None => return Ok(0),
        };

        let mut doomed = Vec::new();

        for (index, document) in documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(&filter)? {
                doomed.push(index);

                if scope == WriteScope::One {
                    break;
                }
            }
        }

        for index in doomed.iter().rev() {
            documents.remove(*index);
        }

        Ok(doomed.len() as u64)
    }

    async fn aggregate(&self, pipeline: Vec<Document>, collection: &str) -> DatabaseResult<Vec<Document>> {
        let store = self.store.read().await;
        let documents = store
            .get(collection)
            .cloned()
            .unwrap_or_default();

        PipelineRunner::new(&store).run(documents, &pipeline)
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// Building never fails: there is nothing to connect to.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DatabaseResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::builder().build().await.unwrap();
        store
            .insert_documents(
                vec![
                    doc! { "pid": "a", "role": "dev", "tags": [] },
                    doc! { "pid": "b", "role": "dev", "tags": ["x"] },
                    doc! { "pid": "c", "role": "qa", "tags": [] },
                ],
                "users",
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn missing_collections_read_as_empty() {
        let store = InMemoryStore::new();

        assert!(store.aggregate(vec![], "nothing").await.unwrap().is_empty());
        assert_eq!(store.delete_documents(doc! {}, WriteScope::Many, "nothing").await.unwrap(), 0);
        assert_eq!(
            store
                .update_documents(doc! {}, doc! { "$set": { "a": 1 } }, WriteScope::Many, "nothing")
                .await
                .unwrap(),
            UpdateOutcome::default()
        );
    }

    #[tokio::test]
    async fn insertion_order_is_preserved() {
        let store = seeded().await;

        let pids = store
            .aggregate(vec![doc! { "$project": { "pid": 1 } }], "users")
            .await
            .unwrap();

        assert_eq!(pids, vec![doc! { "pid": "a" }, doc! { "pid": "b" }, doc! { "pid": "c" }]);
    }

    #[tokio::test]
    async fn update_scope_and_modified_counts() {
        let store = seeded().await;

        let one = store
            .update_documents(doc! { "role": "dev" }, doc! { "$set": { "level": 1 } }, WriteScope::One, "users")
            .await
            .unwrap();
        assert_eq!(one, UpdateOutcome { matched: 1, modified: 1 });

        let many = store
            .update_documents(doc! { "role": "dev" }, doc! { "$addToSet": { "tags": "x" } }, WriteScope::Many, "users")
            .await
            .unwrap();
        assert_eq!(many, UpdateOutcome { matched: 2, modified: 1 });
    }

    #[tokio::test]
    async fn delete_scope() {
        let store = seeded().await;

        assert_eq!(store.delete_documents(doc! { "role": "dev" }, WriteScope::One, "users").await.unwrap(), 1);
        assert_eq!(store.delete_documents(doc! {}, WriteScope::Many, "users").await.unwrap(), 2);
        assert_eq!(store.collection_names().await, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        clone.insert_documents(vec![doc! { "pid": "z" }], "items").await.unwrap();

        assert_eq!(store.aggregate(vec![], "items").await.unwrap(), vec![doc! { "pid": "z" }]);
    }
}
