//! In-memory document storage backend for doctable.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for
//! development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Store-native filters** - Equality, comparison, set and logical operators on dotted paths
//! - **Aggregation** - `$match`, `$project`, `$lookup`, `$unwind`, `$sort`, `$skip`, `$limit`, `$count`
//! - **Update directives** - `$set`, `$unset`, `$addToSet`, `$push`, `$pull`
//!
//! # Quick Start
//!
//! ```ignore
//! use doctable::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let db = Database::new(backend);
//!
//!     let created = db.create_item("users", doc! { "name": "Alice" }, None).await?;
//!     let user = db.get_item_by_pid("users", &created.pid, Fields::All, vec![]).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doctable_memory;

mod aggregate;
mod update;
mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
