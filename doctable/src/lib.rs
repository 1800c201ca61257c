//! Main doctable crate providing a uniform data-access layer over document stores.
//!
//! This crate is the primary entry point for users of doctable. It re-exports the core
//! types from the sub-crates and gives convenient access to the storage backends.
//!
//! # Features
//!
//! - **Free-form collections** - Any collection name works; no schema is declared up front
//! - **Audit metadata** - Every item gets a `pid`, creation and update stamps and actors
//! - **Field selection** - Reads return `pid` only, everything, or a named subset
//! - **Pass-through pipelines** - Filters, sorts and extra stages stay store-native
//! - **Pagination statistics** - Optional totals and page counts alongside a page
//!
//! # Quick Start
//!
//! ```ignore
//! use doctable::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DatabaseResult<()> {
//!     let db = Database::new(InMemoryStore::builder().build().await?);
//!
//!     let eve = db
//!         .create_item("users", doc! { "name": "Eve", "email": "eve@example.com" }, Some("admin"))
//!         .await?;
//!
//!     db.update_item_by_pid("users", &eve.pid, doc! { "role": "dev" }, Some("admin"))
//!         .await?;
//!
//!     let page = db
//!         .get_items(
//!             "users",
//!             ItemsQuery::builder()
//!                 .filter(doc! { "role": "dev" })
//!                 .fields(Fields::only(["name"]))
//!                 .with_stats()
//!                 .build(),
//!         )
//!         .await?;
//!
//!     println!("{:?}", page.stats);
//!
//!     db.shutdown().await
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use doctable_core::{
    array, audit, backend, clock, collection, config, database, error, item, page, pipeline, projection, query,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use doctable_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use doctable_mongodb::{MongoDbStore, MongoDbStoreBuilder};

    use doctable_core::{config::DatabaseConfig, database::Database, error::DatabaseResult};

    /// Connects to MongoDB with `config` and wraps the store in a [`Database`].
    ///
    /// Fails fast with a `Configuration` or `Connection` error; no operation is attempted
    /// against an unreachable store.
    pub async fn connect(config: &DatabaseConfig) -> DatabaseResult<Database<MongoDbStore>> {
        Ok(Database::new(MongoDbStore::connect(config).await?))
    }
}
