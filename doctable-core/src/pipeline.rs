//! Aggregation pipeline assembly for reads and counts.
//!
//! Every read issued by the [`Database`](crate::database::Database) facade is an
//! aggregation pipeline. [`PipelineBuilder`] owns the ordering of the stages it emits:
//!
//! 1. `$match` on the filter, always first;
//! 2. `$project`, when the field selection produces a projection;
//! 3. the caller's extra stages, verbatim and in order;
//! 4. `$sort`, when a non-empty sort was given;
//! 5. `$skip`, when the skip is positive;
//! 6. `$limit`, when a limit was given.
//!
//! Filtering and narrowing therefore happen before any caller join, while sorting and
//! paging apply to the final, joined result. A consequence worth knowing: a `$lookup`
//! in the extra stages only sees fields that survived the projection, so joins usually
//! go together with [`Fields::All`](crate::projection::Fields::All).
//!
//! The count pipeline keeps stages 1-3 and ends in `{ $count: "count" }`, so it counts the
//! whole filtered and joined set rather than one page.
//!
//! # Example
//!
//! ```
//! use bson::doc;
//! use doctable_core::{pipeline::PipelineBuilder, projection::Fields};
//!
//! let pipeline = PipelineBuilder::new(doc! { "role": "dev" })
//!     .fields(&Fields::only(["name"]))
//!     .sort(doc! { "name": 1 })
//!     .skip(2)
//!     .limit(2)
//!     .build_read_pipeline();
//!
//! assert_eq!(pipeline, vec![
//!     doc! { "$match": { "role": "dev" } },
//!     doc! { "$project": { "pid": 1, "name": 1, "_id": 0 } },
//!     doc! { "$sort": { "name": 1 } },
//!     doc! { "$skip": 2_i64 },
//!     doc! { "$limit": 2_i64 },
//! ]);
//! ```

use bson::{Bson, Document, doc};
use tracing::warn;

use crate::projection::Fields;

/// Field name the count stage writes its result to.
pub const COUNT_FIELD: &str = "count";

/// Builds `{ $match: filter }`.
pub fn match_stage(filter: Document) -> Document {
    doc! { "$match": filter }
}

/// Builds `{ $project: projection }`.
pub fn project_stage(projection: Document) -> Document {
    doc! { "$project": projection }
}

/// Builds `{ $sort: sort }`.
pub fn sort_stage(sort: Document) -> Document {
    doc! { "$sort": sort }
}

/// Builds `{ $skip: n }`.
pub fn skip_stage(skip: u64) -> Document {
    doc! { "$skip": to_i64(skip) }
}

/// Builds `{ $limit: n }`.
pub fn limit_stage(limit: u64) -> Document {
    doc! { "$limit": to_i64(limit) }
}

/// Builds `{ $count: "count" }`.
pub fn count_stage() -> Document {
    doc! { "$count": COUNT_FIELD }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Reads the total out of the first document a count pipeline returned.
///
/// An empty result (nothing matched) counts as zero.
pub fn read_count(result: Option<&Document>) -> u64 {
    match result.and_then(|doc| doc.get(COUNT_FIELD)) {
        Some(Bson::Int32(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => u64::try_from(*n).unwrap_or(0),
        Some(Bson::Double(n)) if *n > 0.0 => *n as u64,
        _ => 0,
    }
}

/// Assembles read and count pipelines from a filter, projection, extra stages, sort and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineBuilder {
    filter: Document,
    projection: Option<Document>,
    stages: Vec<Document>,
    sort: Option<Document>,
    skip: u64,
    limit: Option<u64>,
}

impl PipelineBuilder {
    /// Starts a pipeline matching `filter`. An empty filter matches every document.
    ///
    /// Without a call to [`fields`](Self::fields) or [`projection`](Self::projection) no
    /// projection stage is emitted.
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Sets the projection from a field selection.
    pub fn fields(mut self, fields: &Fields) -> Self {
        self.projection = fields.normalize();
        self
    }

    /// Sets a raw projection directive; `None` removes the projection stage.
    pub fn projection(mut self, projection: Option<Document>) -> Self {
        self.projection = projection;
        self
    }

    /// Appends caller stages, kept in the given order after the projection.
    pub fn stages(mut self, stages: impl IntoIterator<Item = Document>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Appends a single caller stage.
    pub fn stage(mut self, stage: Document) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the sort specification. An empty document means "unsorted".
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = if sort.is_empty() { None } else { Some(sort) };
        self
    }

    /// Sets how many documents to skip.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of documents to return.
    ///
    /// A limit of zero is treated as "no limit".
    pub fn limit(mut self, limit: u64) -> Self {
        if limit == 0 {
            warn!("limit of 0 requested, treating it as no limit");
            self.limit = None;
        } else {
            self.limit = Some(limit);
        }
        self
    }

    /// Sets or clears the limit. `Some(0)` is treated like `None`.
    pub fn maybe_limit(self, limit: Option<u64>) -> Self {
        match limit {
            Some(limit) => self.limit(limit),
            None => Self { limit: None, ..self },
        }
    }

    /// Returns the effective limit.
    pub fn effective_limit(&self) -> Option<u64> {
        self.limit
    }

    /// Returns the skip.
    pub fn effective_skip(&self) -> u64 {
        self.skip
    }

    /// Stages shared by the read and count pipelines: match, projection, caller stages.
    fn head(&self) -> Vec<Document> {
        let mut pipeline = Vec::with_capacity(self.stages.len() + 5);

        pipeline.push(match_stage(self.filter.clone()));

        if let Some(projection) = &self.projection {
            pipeline.push(project_stage(projection.clone()));
        }

        pipeline.extend(self.stages.iter().cloned());
        pipeline
    }

    /// Builds the read pipeline: match, projection, caller stages, sort, skip, limit.
    pub fn build_read_pipeline(&self) -> Vec<Document> {
        let mut pipeline = self.head();

        if let Some(sort) = &self.sort {
            pipeline.push(sort_stage(sort.clone()));
        }
        if self.skip > 0 {
            pipeline.push(skip_stage(self.skip));
        }
        if let Some(limit) = self.limit {
            pipeline.push(limit_stage(limit));
        }

        pipeline
    }

    /// Builds the count pipeline: match, projection, caller stages, count.
    ///
    /// Sort, skip and limit are left out so the count covers the whole result set.
    pub fn build_count_pipeline(&self) -> Vec<Document> {
        let mut pipeline = self.head();
        pipeline.push(count_stage());
        pipeline
    }
}
