//! Timestamp source abstraction.
//!
//! Version generation reads time through this trait instead of calling
//! `Utc::now()` directly, so monotonicity and clock-drift behavior are
//! testable without real time.

use crate::identity::Timestamp;
use chrono::Utc;

/// Source of the current time for version generation and audit stamps.
pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
