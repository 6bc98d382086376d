use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use teamgate_core::RoleId;

use crate::permissions::{self, Permission};

/// The fixed set of roles.
///
/// Roles are not composable policies: a user holds exactly one, and routes
/// declare which of these names they admit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Admin,
    Manager,
    Employee,
}

impl RoleName {
    pub const ALL: [RoleName; 3] = [RoleName::Admin, RoleName::Manager, RoleName::Employee];

    /// Role every user falls back to when their role is revoked.
    pub const DEFAULT: RoleName = RoleName::Employee;

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "ADMIN",
            RoleName::Manager => "MANAGER",
            RoleName::Employee => "EMPLOYEE",
        }
    }

    /// Permissions stamped on the role record when it is first created.
    pub fn default_permissions(&self) -> Vec<Permission> {
        match self {
            RoleName::Admin => vec![permissions::ALL],
            RoleName::Manager => vec![permissions::MANAGE_PROJECTS],
            RoleName::Employee => vec![permissions::VIEW_OWN_DATA],
        }
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for RoleName {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(RoleName::Admin),
            "MANAGER" => Ok(RoleName::Manager),
            "EMPLOYEE" => Ok(RoleName::Employee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A persisted role.
///
/// Created once (create-if-absent) and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: RoleName,
    pub permissions: Vec<Permission>,
}

impl RoleRecord {
    pub fn new(name: RoleName) -> Self {
        Self {
            id: RoleId::new(),
            name,
            permissions: name.default_permissions(),
        }
    }
}

/// Pure membership test: is `role` one of the `required` roles?
pub fn has_permission_for(role: RoleName, required: &[RoleName]) -> bool {
    required.contains(&role)
}
