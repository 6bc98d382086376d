//! Infrastructure layer: the storage-access capability and the audit trail
//! write path.
//!
//! Every component receives a [`Storage`] at construction; there is no
//! process-wide client.

pub mod audit_log;
pub mod error;
pub mod roles;
pub mod storage;

pub use audit_log::{AuditLogWriter, AuditOutcome, AuditWriteError};
pub use error::StoreError;
pub use roles::ensure_default_roles;
pub use storage::in_memory::InMemoryStore;
pub use storage::postgres::PostgresStore;
pub use storage::{
    ActorSummary, AuditLogRepository, AuditLogView, ProjectRepository, RoleRepository, Storage,
    StoreResult, UserRepository,
};
