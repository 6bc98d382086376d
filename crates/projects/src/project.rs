use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use teamgate_core::{DomainError, Entity, ProjectId, SoftDelete, UserId};

/// A persisted project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: ProjectId,
    /// Unique across all projects, deleted ones included.
    pub name: String,
    pub description: String,
    pub created_by_id: UserId,
    /// Users the project is assigned to (many-to-many, set semantics).
    pub assigned_to: BTreeSet<UserId>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    pub fn is_assigned_to(&self, user_id: &UserId) -> bool {
        self.assigned_to.contains(user_id)
    }
}

impl Entity for ProjectRecord {
    type Id = ProjectId;
    const KIND: &'static str = "Project";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SoftDelete for ProjectRecord {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub created_by_id: UserId,
    pub assigned_to: BTreeSet<UserId>,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_name(&self.name)?;
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("Project description is required."));
        }
        Ok(())
    }
}

/// Partial update. Assignees in `assign` are connected first, then those in
/// `unassign` are disconnected, so an id present in both ends up unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assign: BTreeSet<UserId>,
    pub unassign: BTreeSet<UserId>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.assign.is_empty()
            && self.unassign.is_empty()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_empty() {
            return Err(DomainError::validation("At least one field must be updated."));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err(DomainError::validation("Project description cannot be empty."));
            }
        }
        Ok(())
    }

    pub fn apply(&self, project: &mut ProjectRecord, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            project.name = name.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        project.assigned_to.extend(self.assign.iter().copied());
        for id in &self.unassign {
            project.assigned_to.remove(id);
        }
        project.updated_at = now;
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Project name is required."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn project() -> ProjectRecord {
        let now = Utc::now();
        ProjectRecord {
            id: ProjectId::new(),
            name: "Apollo".to_string(),
            description: "Moonshot".to_string(),
            created_by_id: UserId::new(),
            assigned_to: BTreeSet::new(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_patch_fails_validation() {
        let err = ProjectPatch::default().validate().unwrap_err();
        assert_eq!(err, DomainError::validation("At least one field must be updated."));
    }

    #[test]
    fn blank_name_fails_validation() {
        let new = NewProject {
            name: "  ".to_string(),
            description: "d".to_string(),
            created_by_id: UserId::new(),
            assigned_to: BTreeSet::new(),
        };
        assert!(new.validate().is_err());
    }

    #[test]
    fn unassign_wins_over_assign() {
        let mut p = project();
        let u = UserId::new();
        let patch = ProjectPatch {
            assign: [u].into_iter().collect(),
            unassign: [u].into_iter().collect(),
            ..Default::default()
        };
        patch.apply(&mut p, Utc::now());
        assert!(!p.is_assigned_to(&u));
    }

    #[test]
    fn soft_delete_messages_name_the_project() {
        let mut p = project();
        assert_eq!(
            p.ensure_restorable().unwrap_err(),
            DomainError::invalid_state("Project is not deleted or already restored")
        );
        p.deleted_at = Some(Utc::now());
        assert_eq!(
            p.ensure_deletable().unwrap_err(),
            DomainError::invalid_state("Project is already deleted")
        );
    }

    #[test]
    fn serializes_assignees_as_list() {
        let mut p = project();
        let u = UserId::new();
        p.assigned_to.insert(u);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["assignedTo"][0], u.to_string());
        assert_eq!(json["createdById"], p.created_by_id.to_string());
    }

    proptest! {
        #[test]
        fn patch_assignment_is_set_arithmetic(
            initial in prop::collection::btree_set(0u8..16, 0..8),
            assign in prop::collection::btree_set(0u8..16, 0..8),
            unassign in prop::collection::btree_set(0u8..16, 0..8),
        ) {
            let ids: Vec<UserId> = (0..16).map(|_| UserId::new()).collect();
            let pick = |s: &BTreeSet<u8>| s.iter().map(|i| ids[*i as usize]).collect::<BTreeSet<_>>();

            let mut p = project();
            p.assigned_to = pick(&initial);
            let patch = ProjectPatch {
                assign: pick(&assign),
                unassign: pick(&unassign),
                ..Default::default()
            };
            patch.apply(&mut p, Utc::now());

            let expected: BTreeSet<UserId> = pick(&initial)
                .union(&pick(&assign))
                .copied()
                .filter(|id| !pick(&unassign).contains(id))
                .collect();
            prop_assert_eq!(p.assigned_to, expected);
        }
    }
}
