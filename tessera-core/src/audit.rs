//! Audit metadata carried by every persisted row.
//!
//! Every mapped table stores, beyond business columns, who created and
//! who last changed the row, together with the origin system, a
//! correlation id and the logical operation name. The last-changed set
//! stays null until the first change.

use crate::identity::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};

/// One side of the audit trail: created-by or last-changed-by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Principal that performed the operation.
    pub by: String,
    /// When the operation happened.
    pub at: Timestamp,
    /// Originating system or channel.
    pub origin: Option<String>,
    /// Correlation id tying the operation to a request or saga.
    pub correlation: Option<RecordId>,
    /// Logical operation name (e.g. "RegisterAsset").
    pub operation: Option<String>,
}

impl AuditStamp {
    /// Create a stamp with only principal and time set.
    pub fn new(by: impl Into<String>, at: Timestamp) -> Self {
        Self {
            by: by.into(),
            at,
            origin: None,
            correlation: None,
            operation: None,
        }
    }
}

/// Full audit trail of a row: creation stamp plus last change stamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordAudit {
    /// Set exactly once at insert.
    pub created: Option<AuditStamp>,
    /// Null until the row is changed for the first time.
    pub changed: Option<AuditStamp>,
}

impl RecordAudit {
    /// Audit trail for a freshly created row.
    pub fn created_by(by: impl Into<String>, at: Timestamp) -> Self {
        Self {
            created: Some(AuditStamp::new(by, at)),
            changed: None,
        }
    }

    /// Record a change, leaving the creation stamp untouched.
    pub fn record_change(&mut self, stamp: AuditStamp) {
        self.changed = Some(stamp);
    }
}
