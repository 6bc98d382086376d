use thiserror::Error;

use crate::roles::{has_permission_for, RoleName};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("role {role} is not permitted here (requires one of {required:?})")]
    InsufficientRole {
        role: RoleName,
        required: Vec<RoleName>,
    },
}

/// Check a resolved role against a route's required-role set.
///
/// - No IO
/// - No panics
/// - The role must come from storage, not from the token
pub fn authorize(role: RoleName, required: &[RoleName]) -> Result<(), AuthzError> {
    if has_permission_for(role, required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            role,
            required: required.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_member() {
        assert_eq!(
            authorize(RoleName::Manager, &[RoleName::Admin, RoleName::Manager]),
            Ok(())
        );
    }

    #[test]
    fn rejects_non_member() {
        let err = authorize(RoleName::Employee, &[RoleName::Admin]).unwrap_err();
        assert_eq!(
            err,
            AuthzError::InsufficientRole {
                role: RoleName::Employee,
                required: vec![RoleName::Admin],
            }
        );
        assert!(err.to_string().contains("EMPLOYEE"));
    }
}
