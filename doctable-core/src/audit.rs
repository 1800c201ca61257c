//! Audit stamping for create and update operations.
//!
//! [`AuditStamper`] never talks to the store. It turns a caller document into an
//! insertable item, and a caller patch into a `$set` update directive, attaching the audit
//! fields defined in [`crate::item`].
//!
//! The audit fields belong to the stamper. A document or patch that already names one of
//! them is rejected with [`DatabaseError::ReservedField`]; in particular a patch can never
//! overwrite `pid`, so an item's identity is fixed for its whole lifetime.

use bson::{Bson, DateTime, Document, doc};

use crate::{
    clock::{Clock, SystemClock},
    error::{DatabaseError, DatabaseResult},
    item::{CREATED_AT, CREATED_BY, PID, UPDATED_AT, UPDATED_BY, generate_pid, is_reserved},
};

/// Attaches creation and update metadata to documents and update directives.
#[derive(Debug, Clone, Default)]
pub struct AuditStamper<C = SystemClock> {
    clock: C,
}

impl<C: Clock> AuditStamper<C> {
    /// Creates a stamper reading time from `clock`.
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Returns the stamper's clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn now(&self) -> DateTime {
        DateTime::from_chrono(self.clock.now())
    }

    /// Returns a copy of `item` carrying a fresh `pid`, `created_at == updated_at == now`,
    /// and `created_by` when a non-empty `actor` is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ReservedField`] if `item` already holds an audit field.
    pub fn on_create(&self, item: &Document, actor: Option<&str>) -> DatabaseResult<Document> {
        reject_reserved(item)?;

        let now = self.now();
        let mut stamped = item.clone();

        stamped.insert(PID, generate_pid());
        stamped.insert(CREATED_AT, now);
        stamped.insert(UPDATED_AT, now);

        if let Some(actor) = named(actor) {
            stamped.insert(CREATED_BY, actor);
        }

        Ok(stamped)
    }

    /// Wraps `patch` in a `$set` directive that also refreshes `updated_at` and, when
    /// supplied, `updated_by`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ReservedField`] if the patch names an audit field, and
    /// [`DatabaseError::InvalidDocument`] if it contains update operators instead of fields.
    pub fn on_update(&self, patch: &Document, actor: Option<&str>) -> DatabaseResult<Document> {
        reject_reserved(patch)?;

        if let Some(operator) = patch.keys().find(|k| k.starts_with('$')) {
            return Err(DatabaseError::InvalidDocument(format!(
                "update patch must contain fields, found operator `{operator}`"
            )));
        }

        let mut set = self.touch(actor);
        for (field, value) in patch {
            set.insert(field.clone(), value.clone());
        }

        Ok(doc! { "$set": set })
    }

    /// Returns the audit part of a `$set` body: `updated_at` and, for a non-empty actor,
    /// `updated_by`.
    pub fn touch(&self, actor: Option<&str>) -> Document {
        let mut set = doc! { UPDATED_AT: self.now() };

        if let Some(actor) = named(actor) {
            set.insert(UPDATED_BY, Bson::String(actor.to_string()));
        }

        set
    }
}

/// An empty actor counts as no actor.
fn named(actor: Option<&str>) -> Option<&str> {
    actor.filter(|actor| !actor.is_empty())
}

fn reject_reserved(document: &Document) -> DatabaseResult<()> {
    match document.keys().find(|k| is_reserved(k)) {
        Some(field) => Err(DatabaseError::ReservedField(field.clone())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemExt;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> chrono::DateTime<Utc> {
            Utc.timestamp_millis_opt(self.0).unwrap()
        }
    }

    fn stamper() -> AuditStamper<FixedClock> {
        AuditStamper::new(FixedClock(1_700_000_000_000))
    }

    #[test]
    fn create_adds_pid_and_equal_timestamps() {
        let input = doc! { "name": "Eve" };
        let stamped = stamper().on_create(&input, Some("tester")).unwrap();

        assert_eq!(input, doc! { "name": "Eve" });
        assert_eq!(stamped.get_str("name").unwrap(), "Eve");
        assert_eq!(stamped.pid().map(str::len), Some(32));
        assert_eq!(stamped.created_at(), stamped.updated_at());
        assert_eq!(stamped.created_at().unwrap().timestamp_millis(), 1_700_000_000_000);
        assert_eq!(stamped.created_by(), Some("tester"));
    }

    #[test]
    fn create_without_actor_omits_created_by() {
        let stamped = stamper().on_create(&doc! { "name": "Fred" }, None).unwrap();

        assert!(!stamped.contains_key(CREATED_BY));
        assert!(!stamped.contains_key(UPDATED_BY));
    }

    #[test]
    fn empty_actor_is_not_recorded() {
        let s = stamper();

        let created = s.on_create(&doc! { "name": "Fred" }, Some("")).unwrap();
        assert!(!created.contains_key(CREATED_BY));

        let directive = s.on_update(&doc! { "name": "Fred QA" }, Some("")).unwrap();
        assert_eq!(
            directive,
            doc! {
                "$set": {
                    "updated_at": DateTime::from_millis(1_700_000_000_000),
                    "name": "Fred QA",
                }
            }
        );
        assert!(!s.touch(Some("")).contains_key(UPDATED_BY));
    }

    #[test]
    fn create_rejects_caller_supplied_pid() {
        let result = stamper().on_create(&doc! { "pid": "mine", "name": "Gina" }, None);

        assert!(matches!(result, Err(DatabaseError::ReservedField(f)) if f == "pid"));
    }

    #[test]
    fn update_wraps_patch_in_set_with_audit_fields() {
        let directive = stamper()
            .on_update(&doc! { "name": "Eve QA" }, Some("tester"))
            .unwrap();

        assert_eq!(
            directive,
            doc! {
                "$set": {
                    "updated_at": DateTime::from_millis(1_700_000_000_000),
                    "updated_by": "tester",
                    "name": "Eve QA",
                }
            }
        );
    }

    #[test]
    fn update_rejects_pid_and_dotted_audit_paths() {
        let s = stamper();

        assert!(matches!(
            s.on_update(&doc! { "pid": "other" }, None),
            Err(DatabaseError::ReservedField(_))
        ));
        assert!(matches!(
            s.on_update(&doc! { "created_at.x": 1 }, None),
            Err(DatabaseError::ReservedField(_))
        ));
    }

    #[test]
    fn update_rejects_operators() {
        let result = stamper().on_update(&doc! { "$inc": { "n": 1 } }, None);

        assert!(matches!(result, Err(DatabaseError::InvalidDocument(_))));
    }
}
