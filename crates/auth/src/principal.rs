use serde::Serialize;

use teamgate_core::{RoleId, UserId};

use crate::roles::RoleName;

/// Identity admitted by the Gate.
///
/// `role` is the name resolved from storage at request time, not anything
/// read out of the token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub role: RoleName,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == RoleName::Admin
    }
}
