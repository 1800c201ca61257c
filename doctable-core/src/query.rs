//! Multi-item read requests.
//!
//! An [`ItemsQuery`] gathers everything [`Database::get_items`](crate::database::Database::get_items)
//! needs: the filter, the field selection, extra caller stages, sort, paging and whether
//! pagination statistics are wanted. Filters, stages and sorts are store-native documents
//! and are passed through as given.
//!
//! ```
//! use bson::doc;
//! use doctable_core::{projection::Fields, query::{ItemsQuery, SortDirection}};
//!
//! let query = ItemsQuery::builder()
//!     .filter(doc! { "role": "dev" })
//!     .fields(Fields::only(["name", "email"]))
//!     .sort_by("name", SortDirection::Asc)
//!     .skip(2)
//!     .limit(2)
//!     .with_stats()
//!     .build();
//!
//! assert_eq!(query.sort, doc! { "name": 1 });
//! assert!(query.stats);
//! ```

use bson::Document;

use crate::{pipeline::PipelineBuilder, projection::Fields};

/// Sort direction for [`QueryBuilder::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// A multi-item read request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsQuery {
    /// Store-native filter; empty matches everything.
    pub filter: Document,
    /// Field selection; defaults to `pid` only.
    pub fields: Fields,
    /// Extra stages run after the projection and before sort/paging.
    pub stages: Vec<Document>,
    /// Sort specification; empty means unsorted.
    pub sort: Document,
    /// Number of documents to skip.
    pub skip: u64,
    /// Maximum number of documents to return. Zero is treated as no limit.
    pub limit: Option<u64>,
    /// Whether to compute [`PaginationStats`](crate::page::PaginationStats).
    pub stats: bool,
}

impl ItemsQuery {
    /// Creates a query matching `filter` with every other setting at its default.
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Returns the pipeline builder for this query.
    pub fn pipeline(&self) -> PipelineBuilder {
        PipelineBuilder::new(self.filter.clone())
            .fields(&self.fields)
            .stages(self.stages.iter().cloned())
            .sort(self.sort.clone())
            .skip(self.skip)
            .maybe_limit(self.limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: ItemsQuery,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: ItemsQuery::default() }
    }

    /// Sets the filter document.
    pub fn filter(mut self, filter: Document) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the field selection.
    pub fn fields(mut self, fields: Fields) -> Self {
        self.query.fields = fields;
        self
    }

    /// Appends an extra pipeline stage.
    pub fn stage(mut self, stage: Document) -> Self {
        self.query.stages.push(stage);
        self
    }

    /// Appends several extra pipeline stages, in order.
    pub fn stages(mut self, stages: impl IntoIterator<Item = Document>) -> Self {
        self.query.stages.extend(stages);
        self
    }

    /// Replaces the sort specification with a raw document.
    pub fn sort(mut self, sort: Document) -> Self {
        self.query.sort = sort;
        self
    }

    /// Adds a sort key. Keys apply in the order they are added.
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.insert(field.into(), direction.as_i32());
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.query.skip = skip;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Requests pagination statistics alongside the items.
    pub fn with_stats(mut self) -> Self {
        self.query.stats = true;
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> ItemsQuery {
        self.query
    }
}
