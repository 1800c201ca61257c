//! Set-semantics update directives for array-valued fields.
//!
//! `push` adds a value only when it is not already in the array (`$addToSet`), so pushing
//! twice leaves a single occurrence. `pull` removes every element equal to, or matching,
//! the given spec (`$pull`). Both directives carry the audit `$set` from
//! [`AuditStamper::touch`], so any document the selector reaches gets a fresh `updated_at`,
//! whether or not its array actually changed.

use bson::{Bson, Document, doc};

use crate::{
    audit::AuditStamper,
    clock::Clock,
    error::{DatabaseError, DatabaseResult},
    item::is_reserved,
};

/// Builds array update directives stamped by an [`AuditStamper`].
#[derive(Debug)]
pub struct ArraySetOps<'a, C> {
    stamper: &'a AuditStamper<C>,
}

impl<'a, C: Clock> ArraySetOps<'a, C> {
    pub fn new(stamper: &'a AuditStamper<C>) -> Self {
        Self { stamper }
    }

    /// Returns `{ $addToSet: { field: value }, $set: { updated_at, updated_by? } }`.
    ///
    /// # Errors
    ///
    /// Fails if `field` is empty or names an audit field.
    pub fn push(&self, field: &str, value: impl Into<Bson>, actor: Option<&str>) -> DatabaseResult<Document> {
        check_field(field)?;

        Ok(doc! {
            "$addToSet": { field: value.into() },
            "$set": self.stamper.touch(actor),
        })
    }

    /// Returns `{ $pull: { field: spec }, $set: { updated_at, updated_by? } }`.
    ///
    /// `spec` is either a plain value, removing equal elements, or a store-native
    /// condition document such as `{ "$in": [...] }` or `{ "role": "dev" }`.
    ///
    /// # Errors
    ///
    /// Fails if `field` is empty or names an audit field.
    pub fn pull(&self, field: &str, spec: impl Into<Bson>, actor: Option<&str>) -> DatabaseResult<Document> {
        check_field(field)?;

        Ok(doc! {
            "$pull": { field: spec.into() },
            "$set": self.stamper.touch(actor),
        })
    }
}

fn check_field(field: &str) -> DatabaseResult<()> {
    if field.is_empty() {
        return Err(DatabaseError::InvalidDocument("array field name is empty".into()));
    }
    if is_reserved(field) {
        return Err(DatabaseError::ReservedField(field.to_string()));
    }

    Ok(())
}
