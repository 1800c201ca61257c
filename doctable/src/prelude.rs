//! Convenient re-exports of commonly used types from doctable.
//!
//! ```ignore
//! use doctable::prelude::*;
//! ```
//!
//! This provides access to the database facade, read request types, item helpers,
//! backend traits, configuration and error types.

pub use doctable_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome, WriteScope},
    clock::{Clock, SystemClock},
    collection::Collection,
    config::DatabaseConfig,
    database::Database,
    error::{DatabaseError, DatabaseResult},
    item::{CreatedItem, ItemExt},
    page::{ItemsPage, PaginationStats},
    projection::Fields,
    query::{ItemsQuery, QueryBuilder, SortDirection},
};
