use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use teamgate_auth::{RoleRecord, UserRecord};
use teamgate_core::{DomainError, UserId};

// -------------------------
// Request DTOs
// -------------------------
//
// Required string fields default to empty so that a missing field reaches the
// same validator (and message) as a blank one.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /auth/register` and `POST /users`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    #[serde(default)]
    pub role_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assigned_to: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub assigned_to: Vec<String>,
    #[serde(default)]
    pub unassigned_to: Vec<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// A user with its role joined in.
#[derive(Debug, Serialize)]
pub struct UserWithRole {
    #[serde(flatten)]
    pub user: UserRecord,
    pub role: Option<RoleRecord>,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_user_ids(raw: &[String]) -> Result<BTreeSet<UserId>, DomainError> {
    raw.iter().map(|s| s.trim().parse::<UserId>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_fields_become_empty() {
        let req: SignupRequest = serde_json::from_str(r#"{"email":"a@b.c"}"#).unwrap();
        assert_eq!(req.username, "");
        assert_eq!(req.password, "");
    }

    #[test]
    fn project_patch_uses_camel_case_lists() {
        let id = UserId::new();
        let req: UpdateProjectRequest =
            serde_json::from_value(serde_json::json!({ "unassignedTo": [id.to_string()] }))
                .unwrap();
        assert!(req.assigned_to.is_empty());
        assert_eq!(parse_user_ids(&req.unassigned_to).unwrap(), [id].into_iter().collect());
    }

    #[test]
    fn bad_user_ids_fail_validation() {
        let err = parse_user_ids(&["nope".to_string()]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn assign_role_body_is_camel_case() {
        let req: AssignRoleRequest = serde_json::from_str(r#"{"roleName":"MANAGER"}"#).unwrap();
        assert_eq!(req.role_name, "MANAGER");
    }
}
