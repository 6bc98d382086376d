//! Audit trail model.
//!
//! Entries are append-only: nothing in this workspace updates or deletes one
//! after it is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AuditLogId, UserId};

/// Who performed an audited action.
///
/// `Anonymous` is the sentinel for events with no authenticated user behind
/// them (e.g. a failed login against an unknown email). It is stored as a
/// null `performed_by_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AuditActor {
    User(UserId),
    Anonymous,
}

impl AuditActor {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            AuditActor::User(id) => Some(*id),
            AuditActor::Anonymous => None,
        }
    }
}

impl From<UserId> for AuditActor {
    fn from(value: UserId) -> Self {
        AuditActor::User(value)
    }
}

impl core::fmt::Display for AuditActor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AuditActor::User(id) => core::fmt::Display::fmt(id, f),
            AuditActor::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// A persisted audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    /// Free-text category, e.g. "User created".
    pub action: String,
    pub performed_by_id: Option<UserId>,
    /// Free-text description of the affected entity.
    pub target_resource: String,
    pub timestamp: DateTime<Utc>,
}

/// An entry ready to be appended (id and timestamp assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditLogEntry {
    pub action: String,
    pub performed_by: AuditActor,
    pub target_resource: String,
}

impl NewAuditLogEntry {
    pub fn new(
        action: impl Into<String>,
        performed_by: AuditActor,
        target_resource: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            performed_by,
            target_resource: target_resource.into(),
        }
    }
}
