//! The database facade.
//!
//! [`Database`] is the public surface of the crate. Every operation takes a free-form
//! collection name and routes through the audit stamper, the projection and pipeline
//! builders and finally a [`Collection`] handle on the backend.
//!
//! Operations come in two flavours:
//!
//! - `*_by_attr` / `*_by_pids` plural forms apply to every matching document and return
//!   the number of documents affected;
//! - singular `*_item_by_attr` / `*_item_by_pid` forms touch at most one document and
//!   return whether anything changed.
//!
//! Counts and booleans report what the store modified. Every mutation rewrites
//! `updated_at`, so an update or array operation reaching a document counts it as changed
//! even when the caller's own fields (or array) end up identical.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use doctable::{prelude::*, memory::InMemoryStore};
//!
//! let db = Database::new(InMemoryStore::new());
//!
//! let eve = db.create_item("users", doc! { "name": "Eve" }, Some("tester")).await?;
//! let found = db.get_item_by_pid("users", &eve.pid, Fields::All, vec![]).await?;
//! assert_eq!(found.unwrap().get_str("name")?, "Eve");
//! ```

use bson::{Bson, Document, doc};
use tracing::debug;

use crate::{
    array::ArraySetOps,
    audit::AuditStamper,
    backend::StoreBackend,
    clock::{Clock, SystemClock},
    collection::Collection,
    error::DatabaseResult,
    item::{CreatedItem, ItemExt, PID},
    page::{ItemsPage, PaginationStats},
    pipeline::{PipelineBuilder, read_count},
    projection::Fields,
    query::ItemsQuery,
};

/// Uniform CRUD, array-membership and paginated reads over any number of collections.
///
/// # Type Parameters
///
/// * `B` - The storage backend
/// * `C` - The clock used for audit stamps, [`SystemClock`] by default
#[derive(Debug)]
pub struct Database<B: StoreBackend, C: Clock = SystemClock> {
    backend: B,
    stamper: AuditStamper<C>,
}

impl<B: StoreBackend> Database<B> {
    /// Creates a database over `backend`, stamping with the system clock.
    pub fn new(backend: B) -> Self {
        Self::with_clock(backend, SystemClock)
    }
}

impl<B: StoreBackend, C: Clock> Database<B, C> {
    /// Creates a database over `backend`, stamping with `clock`.
    pub fn with_clock(backend: B, clock: C) -> Self {
        Self {
            backend,
            stamper: AuditStamper::new(clock),
        }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a handle on the named collection. Any name is accepted.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    fn array_ops(&self) -> ArraySetOps<'_, C> {
        ArraySetOps::new(&self.stamper)
    }

    // Create

    /// Stamps and inserts one item, returning its generated pid.
    ///
    /// # Errors
    ///
    /// Fails with [`ReservedField`](crate::error::DatabaseError::ReservedField) if `item`
    /// already holds an audit field, or with the backend's error if the insert fails.
    pub async fn create_item(
        &self,
        table: &str,
        item: Document,
        created_by: Option<&str>,
    ) -> DatabaseResult<CreatedItem> {
        let stamped = self.stamper.on_create(&item, created_by)?;
        let created = CreatedItem::new(stamped.pid().unwrap_or_default());

        self.collection(table).insert(vec![stamped]).await?;

        debug!(collection = table, pid = %created.pid, "created item");
        Ok(created)
    }

    /// Stamps and inserts several items, returning their pids in input order.
    ///
    /// An empty input makes no store call.
    pub async fn create_items(
        &self,
        table: &str,
        items: Vec<Document>,
        created_by: Option<&str>,
    ) -> DatabaseResult<Vec<CreatedItem>> {
        let stamped = items
            .iter()
            .map(|item| self.stamper.on_create(item, created_by))
            .collect::<DatabaseResult<Vec<_>>>()?;

        let created = stamped
            .iter()
            .map(|doc| CreatedItem::new(doc.pid().unwrap_or_default()))
            .collect::<Vec<_>>();

        if !stamped.is_empty() {
            self.collection(table).insert(stamped).await?;
        }

        debug!(collection = table, count = created.len(), "created items");
        Ok(created)
    }

    // Update

    /// Applies `patch` to every document matching `attributes`.
    pub async fn update_items_by_attr(
        &self,
        table: &str,
        attributes: Document,
        patch: Document,
        updated_by: Option<&str>,
    ) -> DatabaseResult<u64> {
        let update = self.stamper.on_update(&patch, updated_by)?;
        let outcome = self.collection(table).update_many(attributes, update).await?;

        debug!(collection = table, matched = outcome.matched, modified = outcome.modified, "updated items");
        Ok(outcome.modified)
    }

    /// Applies `patch` to every document whose pid is in `pids`.
    pub async fn update_items_by_pids<S: AsRef<str>>(
        &self,
        table: &str,
        pids: &[S],
        patch: Document,
        updated_by: Option<&str>,
    ) -> DatabaseResult<u64> {
        self.update_items_by_attr(table, pids_filter(pids), patch, updated_by)
            .await
    }

    /// Applies `patch` to the first document matching `attributes`.
    pub async fn update_item_by_attr(
        &self,
        table: &str,
        attributes: Document,
        patch: Document,
        updated_by: Option<&str>,
    ) -> DatabaseResult<bool> {
        let update = self.stamper.on_update(&patch, updated_by)?;
        let outcome = self.collection(table).update_one(attributes, update).await?;

        debug!(collection = table, modified = outcome.modified, "updated item");
        Ok(outcome.modified > 0)
    }

    /// Applies `patch` to the document with the given pid.
    ///
    /// Returns `false` if no such document exists. This is not an existence check: a
    /// concurrent delete between a lookup and this call simply yields `false`.
    pub async fn update_item_by_pid(
        &self,
        table: &str,
        pid: &str,
        patch: Document,
        updated_by: Option<&str>,
    ) -> DatabaseResult<bool> {
        self.update_item_by_attr(table, pid_filter(pid), patch, updated_by)
            .await
    }

    // Read

    /// Returns the first document matching `attributes`, shaped by `fields` and `stages`.
    ///
    /// The read pipeline is built with an implicit limit of one. `None` means nothing
    /// matched.
    pub async fn get_item_by_attr(
        &self,
        table: &str,
        attributes: Document,
        fields: Fields,
        stages: Vec<Document>,
    ) -> DatabaseResult<Option<Document>> {
        let pipeline = PipelineBuilder::new(attributes)
            .fields(&fields)
            .stages(stages)
            .limit(1)
            .build_read_pipeline();

        let item = self
            .collection(table)
            .aggregate(pipeline)
            .await?
            .into_iter()
            .next();

        debug!(collection = table, found = item.is_some(), "read item");
        Ok(item)
    }

    /// Returns the document with the given pid.
    pub async fn get_item_by_pid(
        &self,
        table: &str,
        pid: &str,
        fields: Fields,
        stages: Vec<Document>,
    ) -> DatabaseResult<Option<Document>> {
        self.get_item_by_attr(table, pid_filter(pid), fields, stages)
            .await
    }

    /// Runs a multi-item read.
    ///
    /// When `query.stats` is set, a second count pipeline runs after the data pipeline.
    /// The two round trips are independent: under concurrent writers the reported
    /// `items_count` may disagree with the returned page.
    pub async fn get_items(&self, table: &str, query: ItemsQuery) -> DatabaseResult<ItemsPage> {
        let builder = query.pipeline();
        let collection = self.collection(table);

        let items = collection
            .aggregate(builder.build_read_pipeline())
            .await?;

        if !query.stats {
            debug!(collection = table, count = items.len(), "read items");
            return Ok(ItemsPage::new(items));
        }

        let total = read_count(
            collection
                .aggregate(builder.build_count_pipeline())
                .await?
                .first(),
        );
        let stats = PaginationStats::compute(total, builder.effective_skip(), builder.effective_limit());

        debug!(collection = table, count = items.len(), total, "read items with stats");
        Ok(ItemsPage::new(items).with_stats(stats))
    }

    // Delete

    /// Deletes every document matching `attributes`.
    pub async fn delete_items_by_attr(&self, table: &str, attributes: Document) -> DatabaseResult<u64> {
        let deleted = self.collection(table).delete_many(attributes).await?;

        debug!(collection = table, deleted, "deleted items");
        Ok(deleted)
    }

    /// Deletes every document whose pid is in `pids`.
    pub async fn delete_items_by_pids<S: AsRef<str>>(&self, table: &str, pids: &[S]) -> DatabaseResult<u64> {
        self.delete_items_by_attr(table, pids_filter(pids))
            .await
    }

    /// Deletes the first document matching `attributes`.
    pub async fn delete_item_by_attr(&self, table: &str, attributes: Document) -> DatabaseResult<bool> {
        let deleted = self.collection(table).delete_one(attributes).await?;

        debug!(collection = table, deleted, "deleted item");
        Ok(deleted > 0)
    }

    /// Deletes the document with the given pid. A missing pid yields `false`.
    pub async fn delete_item_by_pid(&self, table: &str, pid: &str) -> DatabaseResult<bool> {
        self.delete_item_by_attr(table, pid_filter(pid))
            .await
    }

    /// Deletes every document in the collection.
    pub async fn clear(&self, table: &str) -> DatabaseResult<u64> {
        self.delete_items_by_attr(table, doc! {})
            .await
    }

    // Arrays

    /// Adds `value` to the `array` field of every matching document, unless present.
    pub async fn array_push_item_by_attr(
        &self,
        table: &str,
        attributes: Document,
        array: &str,
        value: impl Into<Bson>,
        updated_by: Option<&str>,
    ) -> DatabaseResult<u64> {
        let update = self.array_ops().push(array, value, updated_by)?;
        let outcome = self.collection(table).update_many(attributes, update).await?;

        debug!(collection = table, array, modified = outcome.modified, "pushed to array");
        Ok(outcome.modified)
    }

    /// Adds `value` to the `array` field of the document with the given pid, unless present.
    pub async fn array_push_item_by_pid(
        &self,
        table: &str,
        pid: &str,
        array: &str,
        value: impl Into<Bson>,
        updated_by: Option<&str>,
    ) -> DatabaseResult<bool> {
        let update = self.array_ops().push(array, value, updated_by)?;
        let outcome = self.collection(table).update_one(pid_filter(pid), update).await?;

        debug!(collection = table, pid, array, modified = outcome.modified, "pushed to array");
        Ok(outcome.modified > 0)
    }

    /// Removes every element equal to, or matching, `spec` from the `array` field of every
    /// matching document.
    ///
    /// Documents reached by `attributes` are counted even if their array held no match,
    /// because their `updated_at` is still refreshed.
    pub async fn array_pull_item_by_attr(
        &self,
        table: &str,
        attributes: Document,
        array: &str,
        spec: impl Into<Bson>,
        updated_by: Option<&str>,
    ) -> DatabaseResult<u64> {
        let update = self.array_ops().pull(array, spec, updated_by)?;
        let outcome = self.collection(table).update_many(attributes, update).await?;

        debug!(collection = table, array, modified = outcome.modified, "pulled from array");
        Ok(outcome.modified)
    }

    /// Removes every element equal to, or matching, `spec` from the `array` field of the
    /// document with the given pid.
    pub async fn array_pull_item_by_pid(
        &self,
        table: &str,
        pid: &str,
        array: &str,
        spec: impl Into<Bson>,
        updated_by: Option<&str>,
    ) -> DatabaseResult<bool> {
        let update = self.array_ops().pull(array, spec, updated_by)?;
        let outcome = self.collection(table).update_one(pid_filter(pid), update).await?;

        debug!(collection = table, pid, array, modified = outcome.modified, "pulled from array");
        Ok(outcome.modified > 0)
    }

    /// Shuts down the store and releases backend resources.
    pub async fn shutdown(self) -> DatabaseResult<()> {
        self.backend.shutdown().await
    }
}

fn pid_filter(pid: &str) -> Document {
    doc! { PID: pid }
}

fn pids_filter<S: AsRef<str>>(pids: &[S]) -> Document {
    let pids = pids
        .iter()
        .map(|pid| Bson::String(pid.as_ref().to_string()))
        .collect::<Vec<_>>();

    doc! { PID: { "$in": pids } }
}
