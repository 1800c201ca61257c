//! MongoDB backend implementation for doctable.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Filters,
//! update directives and aggregation pipelines are handed to the server untouched.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! doctable = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Building the store validates the [`DatabaseConfig`](doctable_core::config::DatabaseConfig),
//! connects with the configured server selection timeout and pings the server. Failures
//! surface as `Configuration` or `Connection` errors before any operation runs.
//!
//! # Example
//!
//! ```ignore
//! use doctable::{backend::StoreBackendBuilder, config::DatabaseConfig, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder(DatabaseConfig::from_env()?)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as doctable_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
