//! The generic item model: audit field names, pid generation and accessors.
//!
//! An item is an ordinary [`bson::Document`]. Once it has gone through
//! [`Database::create_item`](crate::database::Database::create_item) it carries a `pid`
//! plus the audit fields listed in [`RESERVED_FIELDS`]; everything else is caller data and
//! is stored untouched.

use bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External primary key of an item. Distinct from the store-internal `_id`.
pub const PID: &str = "pid";
/// Store-internal primary key. Never part of an item's public shape.
pub const STORAGE_ID: &str = "_id";
/// Creation instant, UTC.
pub const CREATED_AT: &str = "created_at";
/// Last mutation instant, UTC.
pub const UPDATED_AT: &str = "updated_at";
/// Actor that created the item, when supplied.
pub const CREATED_BY: &str = "created_by";
/// Actor behind the last mutation, when supplied.
pub const UPDATED_BY: &str = "updated_by";

/// Fields owned by the audit stamper. Callers may read them but never write them.
pub const RESERVED_FIELDS: [&str; 5] = [PID, CREATED_AT, UPDATED_AT, CREATED_BY, UPDATED_BY];

/// Returns `true` if `field`, or the top-level segment of a dotted path, is reserved.
pub fn is_reserved(field: &str) -> bool {
    let root = field.split('.').next().unwrap_or(field);
    RESERVED_FIELDS.contains(&root)
}

/// Generates a fresh pid: the 32 lowercase hex digits of a random v4 UUID.
pub fn generate_pid() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The value returned by create operations: just the generated pid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreatedItem {
    pub pid: String,
}

impl CreatedItem {
    pub fn new(pid: impl Into<String>) -> Self {
        Self { pid: pid.into() }
    }

    /// Returns `{pid: <value>}`, usable directly as a filter.
    pub fn to_document(&self) -> Document {
        doc! { PID: self.pid.clone() }
    }
}

impl From<CreatedItem> for String {
    fn from(item: CreatedItem) -> Self {
        item.pid
    }
}

/// Read accessors for the audit fields of an item.
///
/// Implemented for [`bson::Document`]; every accessor returns `None` when the field is
/// absent (for instance because the read projected it away) or has an unexpected type.
pub trait ItemExt {
    /// Returns the item's pid.
    fn pid(&self) -> Option<&str>;

    /// Returns the creation instant.
    fn created_at(&self) -> Option<DateTime>;

    /// Returns the last mutation instant.
    fn updated_at(&self) -> Option<DateTime>;

    /// Returns the creating actor.
    fn created_by(&self) -> Option<&str>;

    /// Returns the last mutating actor.
    fn updated_by(&self) -> Option<&str>;
}

impl ItemExt for Document {
    fn pid(&self) -> Option<&str> {
        self.get(PID).and_then(|v| v.as_str())
    }

    fn created_at(&self) -> Option<DateTime> {
        self.get(CREATED_AT).and_then(|v| v.as_datetime()).copied()
    }

    fn updated_at(&self) -> Option<DateTime> {
        self.get(UPDATED_AT).and_then(|v| v.as_datetime()).copied()
    }

    fn created_by(&self) -> Option<&str> {
        self.get(CREATED_BY).and_then(|v| v.as_str())
    }

    fn updated_by(&self) -> Option<&str> {
        self.get(UPDATED_BY).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_opaque_hex_and_unique() {
        let a = generate_pid();
        let b = generate_pid();

        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }

    #[test]
    fn reserved_check_covers_dotted_paths() {
        assert!(is_reserved("pid"));
        assert!(is_reserved("updated_at.nested"));
        assert!(!is_reserved("pids"));
        assert!(!is_reserved("name"));
    }

    #[test]
    fn accessors_tolerate_missing_fields() {
        let item = doc! { "pid": "abc", "name": "Eve" };

        assert_eq!(item.pid(), Some("abc"));
        assert_eq!(item.created_at(), None);
        assert_eq!(item.updated_by(), None);
    }
}
