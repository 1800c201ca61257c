//! Field selection for reads.
//!
//! A read can ask for three different shapes, and they are kept apart explicitly:
//!
//! | [`Fields`]          | projection stage                      | returned fields          |
//! |---------------------|---------------------------------------|--------------------------|
//! | `IdOnly` (default)  | `{ pid: 1, _id: 0 }`                  | `pid`                    |
//! | `All`               | none                                  | the whole document       |
//! | `Only(names)`       | `{ pid: 1, <name>: 1, ..., _id: 0 }`  | `pid` plus every name    |
//!
//! `All` returns documents exactly as stored, so a backend that keeps its own `_id`
//! hands it back there. Caller stages run after the projection and their output is
//! never rewritten.
//!
//! Reads default to `IdOnly` so that a call which forgets to choose never ships whole
//! documents.

use bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::item::{PID, STORAGE_ID};

/// Which fields a read returns.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub enum Fields {
    /// Only the `pid`.
    #[default]
    IdOnly,
    /// The full document; no projection stage is emitted.
    All,
    /// The `pid` plus the named fields. `pid` need not be listed; an empty list behaves
    /// like [`Fields::IdOnly`].
    Only(Vec<String>),
}

impl Fields {
    /// Selects `pid` plus the given field names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fields::Only(names.into_iter().map(Into::into).collect())
    }

    /// Translates the selection into a projection directive.
    ///
    /// Returns `None` for [`Fields::All`], meaning no projection stage at all. Any
    /// other selection hides the storage-level `_id` unless it is named explicitly.
    pub fn normalize(&self) -> Option<Document> {
        let names: &[String] = match self {
            Fields::All => return None,
            Fields::IdOnly => &[],
            Fields::Only(names) => names,
        };

        let mut projection = doc! { PID: 1 };
        for name in names {
            projection.insert(name.clone(), 1);
        }
        if !projection.contains_key(STORAGE_ID) {
            projection.insert(STORAGE_ID, 0);
        }
        Some(projection)
    }
}
