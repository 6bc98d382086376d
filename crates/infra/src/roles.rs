use tracing::info;

use teamgate_auth::{RoleName, RoleRecord};

use crate::error::StoreError;
use crate::storage::RoleRepository;

/// Create ADMIN, MANAGER and EMPLOYEE if absent. Existing records are
/// returned untouched.
pub async fn ensure_default_roles(
    roles: &dyn RoleRepository,
) -> Result<Vec<RoleRecord>, StoreError> {
    let mut ensured = Vec::with_capacity(RoleName::ALL.len());
    for name in RoleName::ALL {
        ensured.push(roles.create_if_absent(name).await?);
    }
    info!(count = ensured.len(), "default roles ensured");
    Ok(ensured)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::in_memory::InMemoryStore;

    #[tokio::test]
    async fn is_idempotent() {
        let store = InMemoryStore::new();
        let first = ensure_default_roles(&store).await.unwrap();
        let second = ensure_default_roles(&store).await.unwrap();

        assert_eq!(first, second);
        let names: Vec<RoleName> = first.iter().map(|r| r.name).collect();
        assert_eq!(names, RoleName::ALL.to_vec());
    }

    #[tokio::test]
    async fn keeps_default_permissions() {
        let store = InMemoryStore::new();
        let roles = ensure_default_roles(&store).await.unwrap();
        let admin = roles.iter().find(|r| r.name == RoleName::Admin).unwrap();
        assert!(admin.permissions.iter().any(|p| p.is_wildcard()));
    }
}
