//! `teamgate-auth`: authentication and authorization boundary.
//!
//! No HTTP or storage code lives here. This crate owns the
//! role model, credential and token handling, and the pure role check. The
//! request-time Gate that combines these with storage lives in the API crate.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{authorize, AuthzError};
pub use claims::{validate_claims, TokenClaims, TokenError};
pub use password::{hash_password, verify_password, PasswordError};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{has_permission_for, RoleName, RoleRecord, UnknownRole};
pub use token::{SigningKeyError, TokenService, DEFAULT_TOKEN_TTL_HOURS};
pub use user::{NewUser, UserPatch, UserRecord};
