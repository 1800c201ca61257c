//! Pagination statistics and multi-item read results.
//!
//! [`PaginationStats`] is derived per request from the count pipeline's total and the
//! request's skip/limit. It is never stored.

use bson::Document;
use serde::{Deserialize, Serialize};

/// Statistics describing one multi-item read.
///
/// Serializes with camelCase keys (`itemsCount`, `pageSize`, `firstIndexReturned`,
/// `pagesCount`).
///
/// # Example
///
/// ```
/// use doctable_core::page::PaginationStats;
///
/// let stats = PaginationStats::compute(7, 2, Some(2));
///
/// assert_eq!(stats.pages_count, 4);
/// assert_eq!(stats.first_index_returned, Some(2));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationStats {
    /// Total number of items matched by the filter and caller stages.
    pub items_count: u64,
    /// The limit of the request, or `items_count` when there was none.
    pub page_size: u64,
    /// The skip of the request; absent when nothing matched.
    pub first_index_returned: Option<u64>,
    /// `ceil(items_count / limit)` with a limit, 1 without.
    pub pages_count: u64,
}

impl PaginationStats {
    /// Computes the statistics for `items_count` matches read with `skip` and `limit`.
    ///
    /// A limit of zero counts as no limit.
    pub fn compute(items_count: u64, skip: u64, limit: Option<u64>) -> Self {
        let limit = limit.filter(|l| *l > 0);

        Self {
            items_count,
            page_size: limit.unwrap_or(items_count),
            first_index_returned: (items_count > 0).then_some(skip),
            pages_count: match limit {
                Some(limit) => items_count.div_ceil(limit),
                None => 1,
            },
        }
    }
}

/// The result of a multi-item read: the items, plus statistics when they were requested.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ItemsPage {
    /// The documents returned by the read pipeline.
    pub items: Vec<Document>,
    /// Present only when the read asked for statistics.
    pub stats: Option<PaginationStats>,
}

impl ItemsPage {
    /// Creates a page without statistics.
    pub fn new(items: Vec<Document>) -> Self {
        Self { items, stats: None }
    }

    /// Attaches statistics to the page.
    pub fn with_stats(mut self, stats: PaginationStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Returns the items, dropping any statistics.
    pub fn into_items(self) -> Vec<Document> {
        self.items
    }

    /// Splits the page into its items and statistics.
    pub fn into_parts(self) -> (Vec<Document>, Option<PaginationStats>) {
        (self.items, self.stats)
    }
}
