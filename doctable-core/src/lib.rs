//! A generic data-access layer over schema-less document stores.
//!
//! This crate is the core of the doctable project and provides:
//!
//! - **Database facade** ([`database`]) - CRUD, array and paginated reads on any named collection
//! - **Audit stamping** ([`audit`]) - `pid`, `created_*` and `updated_*` metadata on every write
//! - **Field selection** ([`projection`]) - The three-state `Fields` contract for reads
//! - **Pipeline assembly** ([`pipeline`]) - Ordered read and count aggregation pipelines
//! - **Array operations** ([`array`]) - Set-semantics push and pull directives
//! - **Multi-item reads** ([`query`], [`page`]) - Query builder, pagination statistics
//! - **Store backend abstraction** ([`backend`], [`collection`]) - The capability backends implement
//! - **Configuration** ([`config`]) - Explicit connection settings
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//! use doctable::{prelude::*, memory::InMemoryStore};
//!
//! let db = Database::new(InMemoryStore::new());
//!
//! let created = db
//!     .create_items("users", vec![doc! { "name": "Fred" }, doc! { "name": "Gina" }], Some("seeder"))
//!     .await?;
//!
//! let page = db
//!     .get_items(
//!         "users",
//!         ItemsQuery::builder()
//!             .fields(Fields::only(["name"]))
//!             .sort_by("name", SortDirection::Asc)
//!             .limit(1)
//!             .with_stats()
//!             .build(),
//!     )
//!     .await?;
//!
//! assert_eq!(page.stats.unwrap().pages_count, 2);
//! ```

#[allow(unused_extern_crates)]
extern crate self as doctable_core;

pub mod array;
pub mod audit;
pub mod backend;
pub mod clock;
pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod item;
pub mod page;
pub mod pipeline;
pub mod projection;
pub mod query;
