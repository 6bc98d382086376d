//! User (actor) records and their input rules.
//!
//! Users own exactly one role and follow the soft-delete lifecycle
//! (active -> deleted -> active).

use chrono::{DateTime, Utc};
use serde::Serialize;

use teamgate_core::{DomainError, Entity, RoleId, SoftDelete, UserId};

pub const MIN_PASSWORD_LEN: usize = 6;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A persisted user.
///
/// The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: RoleId,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for UserRecord {
    type Id = UserId;
    const KIND: &'static str = "User";

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl SoftDelete for UserRecord {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Input for creating a user. The password is already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: RoleId,
}

/// Profile changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password_hash.is_none()
    }

    pub fn apply(&self, user: &mut UserRecord, now: DateTime<Utc>) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(hash) = &self.password_hash {
            user.password_hash = hash.clone();
        }
        user.updated_at = now;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Input rules
// ─────────────────────────────────────────────────────────────────────────────

pub fn validate_username(username: &str) -> Result<(), DomainError> {
    if username.trim().is_empty() {
        return Err(DomainError::validation("Username is required."));
    }
    Ok(())
}

/// Basic shape check; deliverability is not our concern.
pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("Please provide a valid email address."));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long."
        )));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: UserId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$v=19$stub".to_string(),
            role_id: RoleId::new(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
        assert!(json["deletedAt"].is_null());
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut u = user();
        let before = u.clone();
        let patch = UserPatch {
            username: Some("alice2".to_string()),
            ..Default::default()
        };

        patch.apply(&mut u, Utc::now());

        assert_eq!(u.username, "alice2");
        assert_eq!(u.email, before.email);
        assert_eq!(u.password_hash, before.password_hash);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(UserPatch::default().is_empty());
        assert!(!UserPatch {
            email: Some("x@y.z".to_string()),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn soft_delete_lifecycle() {
        let mut u = user();
        assert!(u.ensure_deletable().is_ok());
        u.deleted_at = Some(Utc::now());
        assert_eq!(
            u.ensure_deletable().unwrap_err(),
            DomainError::invalid_state("User is already deleted")
        );
        assert!(u.ensure_restorable().is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("bob@example.com").is_ok());
        assert!(validate_email("invalid-email").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("bob@").is_err());
        assert!(validate_email("a@b@c").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("123456").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("   ").is_err());
    }
}
