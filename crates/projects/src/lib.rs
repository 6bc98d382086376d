//! Projects domain module.
//!
//! Plain records and the rules around them (no IO, no HTTP, no storage).

pub mod project;

pub use project::{NewProject, ProjectPatch, ProjectRecord};
