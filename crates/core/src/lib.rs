//! `teamgate-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod audit;
pub mod entity;
pub mod error;
pub mod id;

pub use audit::{AuditActor, AuditLogEntry, NewAuditLogEntry};
pub use entity::{Entity, SoftDelete};
pub use error::{DomainError, DomainResult};
pub use id::{AuditLogId, ProjectId, RoleId, UserId};
