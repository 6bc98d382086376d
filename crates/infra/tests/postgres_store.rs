//! Postgres store against a live database.
//!
//! Set `DATABASE_URL` to run these; without it every test returns early.
//! Names and emails are suffixed with fresh ids so runs can share a database.

use std::collections::BTreeSet;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;

use teamgate_auth::{NewUser, RoleName, RoleRecord, UserPatch, UserRecord};
use teamgate_core::{AuditActor, NewAuditLogEntry, RoleId, UserId};
use teamgate_infra::{
    AuditLogRepository, PostgresStore, ProjectRepository, RoleRepository, StoreError,
    UserRepository,
};
use teamgate_projects::{NewProject, ProjectPatch};

static SCHEMA: OnceCell<()> = OnceCell::const_new();

async fn store() -> Option<PostgresStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping postgres test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("failed to connect to DATABASE_URL");
    let store = PostgresStore::new(pool);
    SCHEMA
        .get_or_init(|| async {
            store.ensure_schema().await.expect("schema");
        })
        .await;
    Some(store)
}

fn suffix() -> String {
    UserId::new().to_string()
}

async fn employee_role(store: &PostgresStore) -> RoleRecord {
    store.create_if_absent(RoleName::Employee).await.unwrap()
}

async fn new_user(store: &PostgresStore, role: &RoleRecord, name: &str) -> UserRecord {
    UserRepository::insert(
        store,
        NewUser {
            username: name.to_string(),
            email: format!("{name}-{}@example.com", suffix()),
            password_hash: "$argon2id$v=19$stub".to_string(),
            role_id: role.id,
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn create_if_absent_returns_existing_role() {
    let Some(store) = store().await else { return };

    let first = store.create_if_absent(RoleName::Manager).await.unwrap();
    let again = store.create_if_absent(RoleName::Manager).await.unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(
        RoleRepository::find_by_id(&store, first.id).await.unwrap(),
        Some(first)
    );
}

#[tokio::test]
async fn duplicate_email_and_name_are_conflicts() {
    let Some(store) = store().await else { return };
    let role = employee_role(&store).await;
    let user = new_user(&store, &role, "dup").await;

    let err = UserRepository::insert(
        &store,
        NewUser {
            username: "dup2".to_string(),
            email: user.email.clone(),
            password_hash: "x".to_string(),
            role_id: role.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");

    let name = format!("Apollo-{}", suffix());
    let project = || NewProject {
        name: name.clone(),
        description: "d".to_string(),
        created_by_id: user.id,
        assigned_to: BTreeSet::new(),
    };
    ProjectRepository::insert(&store, project()).await.unwrap();
    let err = ProjectRepository::insert(&store, project()).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
}

#[tokio::test]
async fn unknown_role_reference_is_not_found() {
    let Some(store) = store().await else { return };

    let err = UserRepository::insert(
        &store,
        NewUser {
            username: "orphan".to_string(),
            email: format!("orphan-{}@example.com", suffix()),
            password_hash: "x".to_string(),
            role_id: RoleId::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn user_patch_leaves_missing_fields_alone() {
    let Some(store) = store().await else { return };
    let role = employee_role(&store).await;
    let user = new_user(&store, &role, "patchy").await;

    let updated = UserRepository::update(
        &store,
        user.id,
        UserPatch {
            username: Some("patched".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.username, "patched");
    assert_eq!(updated.email, user.email);
    assert_eq!(updated.password_hash, user.password_hash);

    let err = UserRepository::update(&store, UserId::new(), UserPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn assignees_connect_then_disconnect() {
    let Some(store) = store().await else { return };
    let role = employee_role(&store).await;
    let owner = new_user(&store, &role, "owner").await;
    let ann = new_user(&store, &role, "ann").await;
    let ben = new_user(&store, &role, "ben").await;

    let project = ProjectRepository::insert(
        &store,
        NewProject {
            name: format!("Gemini-{}", suffix()),
            description: "d".to_string(),
            created_by_id: owner.id,
            assigned_to: [ann.id].into_iter().collect(),
        },
    )
    .await
    .unwrap();
    assert_eq!(project.assigned_to, [ann.id].into_iter().collect());

    let updated = ProjectRepository::update(
        &store,
        project.id,
        ProjectPatch {
            assign: [ben.id, ann.id].into_iter().collect(),
            unassign: [ann.id].into_iter().collect(),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.assigned_to, [ben.id].into_iter().collect());
    assert_eq!(updated.name, project.name);

    let for_ben = store.list_assigned_to(ben.id).await.unwrap();
    assert!(for_ben.iter().any(|p| p.id == project.id));
    let for_ann = store.list_assigned_to(ann.id).await.unwrap();
    assert!(for_ann.iter().all(|p| p.id != project.id));

    let reloaded = ProjectRepository::find_by_id(&store, project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.assigned_to, updated.assigned_to);
}

#[tokio::test]
async fn audit_list_joins_actor_or_none() {
    let Some(store) = store().await else { return };
    let role = employee_role(&store).await;
    let actor = new_user(&store, &role, "auditor").await;
    let tag = suffix();

    let anonymous = store
        .append(NewAuditLogEntry::new(
            "Failed login attempt",
            AuditActor::Anonymous,
            format!("Email: ghost-{tag}@example.com"),
        ))
        .await
        .unwrap();
    let known = store
        .append(NewAuditLogEntry::new(
            "User logged in",
            AuditActor::User(actor.id),
            format!("Email: {}", actor.email),
        ))
        .await
        .unwrap();
    assert_eq!(anonymous.performed_by_id, None);

    let views = store.list_with_actors().await.unwrap();
    let position = |id| views.iter().position(|v| v.entry.id == id).unwrap();
    let (a, k) = (position(anonymous.id), position(known.id));
    assert!(a < k);

    assert_eq!(views[a].performed_by, None);
    let summary = views[k].performed_by.as_ref().unwrap();
    assert_eq!(summary.id, actor.id);
    assert_eq!(summary.username, "auditor");
    assert_eq!(summary.role_id, role.id);
}

#[tokio::test]
async fn closed_pool_reports_backend_error() {
    let Some(store) = store().await else { return };
    let role = employee_role(&store).await;

    store.close().await;

    let err = RoleRepository::find_by_id(&store, role.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)), "{err:?}");

    let Some(reconnected) = self::store().await else { return };
    assert_eq!(
        RoleRepository::find_by_id(&reconnected, role.id).await.unwrap(),
        Some(role)
    );
}
