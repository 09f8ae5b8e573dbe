//! Ports to the hosted backend.
//!
//! The admin services only talk to these traits. `rest` speaks the hosted
//! service's HTTP API, `crate::db::PgRoleStore` goes straight to Postgres and
//! `memory` keeps everything in-process.

pub mod memory;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use async_trait::async_trait;

use crate::error::AdminResult;
use crate::models::{AuthUser, Profile, Role, Session, SignUpRequest, UserRole};

/// Account management owned by the auth service.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Session of the current caller, `None` when nobody is signed in.
    async fn current_session(&self) -> AdminResult<Option<Session>>;

    /// Register a new account.
    async fn sign_up(&self, request: &SignUpRequest) -> AdminResult<AuthUser>;

    /// All accounts known to the auth service. Requires elevated credentials.
    async fn list_users(&self) -> AdminResult<Vec<AuthUser>>;
}

/// Role and profile rows plus the server-side privilege check.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role(&self, user_id: &str, role: Role) -> AdminResult<Option<UserRole>>;

    /// Delete every (user_id, role) row. Returns the number removed.
    async fn delete_roles(&self, user_id: &str, role: Role) -> AdminResult<u64>;

    async fn insert_role(&self, user_id: &str, role: Role) -> AdminResult<UserRole>;

    /// User ids holding `role`, one entry per row.
    async fn list_role_holders(&self, role: Role) -> AdminResult<Vec<String>>;

    /// `is_admin()` evaluated with the caller's identity.
    async fn is_admin_rpc(&self, session: &Session) -> AdminResult<bool>;

    async fn get_profile(&self, user_id: &str) -> AdminResult<Option<Profile>>;

    /// Case-insensitive lookup by email.
    async fn find_profile_by_email(&self, email: &str) -> AdminResult<Option<Profile>>;

    /// Set `profiles.role`. Returns the number of rows updated.
    async fn update_profile_role(&self, user_id: &str, role: Role) -> AdminResult<u64>;
}
