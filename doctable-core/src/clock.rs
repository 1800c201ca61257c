//! Time source for audit stamps.

use chrono::{DateTime, Utc};
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

/// Supplies the current UTC instant to the audit stamper.
///
/// The default [`SystemClock`] reads the wall clock. Tests and replay tools can plug
/// in their own implementation through [`Database::with_clock`](crate::database::Database::with_clock).
pub trait Clock: Send + Sync + Debug {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Last millisecond handed out by any [`SystemClock`] in this process.
static LAST_ISSUED_MILLIS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Wall-clock time source, truncated to millisecond precision.
///
/// Readings are strictly increasing within a process: two calls that land in the
/// same wall-clock millisecond are spread over consecutive milliseconds. Stored
/// timestamps only keep milliseconds, so this is what guarantees that every write
/// moves `updated_at` forward.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_millis();
        let previous = LAST_ISSUED_MILLIS
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(wall.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        let issued = wall.max(previous.saturating_add(1));

        DateTime::from_timestamp_millis(issued).unwrap_or_else(Utc::now)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
