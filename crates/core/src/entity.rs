//! Entity traits: identity plus the soft-delete lifecycle shared by users and projects.

use chrono::{DateTime, Utc};

use crate::error::DomainError;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Human-readable kind used in error messages ("User", "Project").
    const KIND: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Entities that are marked inactive with a deletion timestamp instead of
/// being removed.
///
/// Lifecycle: active -> soft-deleted -> active. Both transitions are checked:
/// deleting an already-deleted entity, or restoring an active one, is an
/// `InvalidState` error rather than a silent no-op.
pub trait SoftDelete: Entity {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }

    fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.is_deleted() {
            return Err(DomainError::invalid_state(format!(
                "{} is already deleted",
                Self::KIND
            )));
        }
        Ok(())
    }

    fn ensure_restorable(&self) -> Result<(), DomainError> {
        if !self.is_deleted() {
            return Err(DomainError::invalid_state(format!(
                "{} is not deleted or already restored",
                Self::KIND
            )));
        }
        Ok(())
    }
}
