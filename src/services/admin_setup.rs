//! Creating, promoting and demoting admin accounts.
//!
//! Role and profile rows are written with separate calls and no transaction.
//! Only account creation and the role insert on promotion can fail an
//! operation; the other writes are logged and skipped.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{AuthProvider, RoleStore};
use crate::config::AdminConfig;
use crate::error::AdminResult;
use crate::models::{Role, SignUpMetadata, SignUpRequest};
use crate::services::reconcile::{reconcile_profile, ReconcileOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminActionResult {
    pub success: bool,
    pub message: String,
    pub user_id: Option<String>,
}

impl AdminActionResult {
    fn ok(message: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            user_id,
        }
    }

    fn failed(message: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            user_id,
        }
    }
}

pub struct AdminSetup {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn RoleStore>,
    config: AdminConfig,
}

impl AdminSetup {
    pub fn new(auth: Arc<dyn AuthProvider>, store: Arc<dyn RoleStore>, config: AdminConfig) -> Self {
        Self {
            auth,
            store,
            config,
        }
    }

    /// Grant admin to `email`, creating the account if nobody has it yet.
    /// Safe to repeat: a second call finds the role record and only refreshes
    /// the profile.
    pub async fn create_admin_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> AdminActionResult {
        let email = email.trim();
        if email.is_empty() {
            return AdminActionResult::failed("Email is required", None);
        }

        match self.find_existing_user(email).await {
            Some(user_id) => self.promote(email, user_id).await,
            None => self.create(email, password, name).await,
        }
    }

    /// Remove the admin role from `email`. Refuses to remove the last admin.
    pub async fn revoke_admin_user(&self, email: &str) -> AdminActionResult {
        let email = email.trim();
        if email.is_empty() {
            return AdminActionResult::failed("Email is required", None);
        }

        let Some(user_id) = self.find_existing_user(email).await else {
            return AdminActionResult::failed(format!("User {} not found", email), None);
        };

        match self.store.find_role(&user_id, Role::Admin).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return AdminActionResult::failed(
                    format!("User {} is not an admin", email),
                    Some(user_id),
                )
            }
            Err(e) => {
                tracing::error!("Role lookup failed for user {}: {}", user_id, e);
                return AdminActionResult::failed(
                    format!("Failed to check admin role: {}", e.user_message()),
                    Some(user_id),
                );
            }
        }

        let holders = match self.store.list_role_holders(Role::Admin).await {
            Ok(holders) => holders.into_iter().collect::<HashSet<_>>(),
            Err(e) => {
                tracing::error!("Could not count admins: {}", e);
                return AdminActionResult::failed(
                    format!("Failed to verify remaining admins: {}", e.user_message()),
                    Some(user_id),
                );
            }
        };
        if holders.iter().all(|id| *id == user_id) {
            return AdminActionResult::failed("Cannot demote the last admin", Some(user_id));
        }

        if let Err(e) = self.store.delete_roles(&user_id, Role::Admin).await {
            tracing::error!("Failed to delete admin role for user {}: {}", user_id, e);
            return AdminActionResult::failed(
                format!("Failed to revoke admin role: {}", e.user_message()),
                Some(user_id),
            );
        }
        self.write_profile_role(&user_id, Role::User).await;

        tracing::info!("Revoked admin role from {} ({})", email, user_id);
        AdminActionResult::ok(format!("Admin role revoked from {}", email), Some(user_id))
    }

    pub async fn reconcile_profile(&self, user_id: &str) -> AdminResult<ReconcileOutcome> {
        reconcile_profile(self.store.as_ref(), user_id).await
    }

    /// Auth listing first, then profiles. Lookup faults count as "not found".
    async fn find_existing_user(&self, email: &str) -> Option<String> {
        match self.auth.list_users().await {
            Ok(users) => {
                if let Some(user) = users.iter().find(|u| u.email_matches(email)) {
                    tracing::debug!("Found auth user {} for {}", user.id, email);
                    return Some(user.id.clone());
                }
            }
            Err(e) => tracing::warn!("Could not list auth users: {}", e),
        }

        match self.store.find_profile_by_email(email).await {
            Ok(Some(profile)) => {
                tracing::debug!("Found profile {} for {}", profile.id, email);
                Some(profile.id)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Profile lookup by email failed: {}", e);
                None
            }
        }
    }

    async fn promote(&self, email: &str, user_id: String) -> AdminActionResult {
        match self.store.find_role(&user_id, Role::Admin).await {
            Ok(Some(_)) => {
                self.write_profile_role(&user_id, Role::Admin).await;
                tracing::info!("User {} ({}) is already an admin", email, user_id);
                return AdminActionResult::ok(
                    format!("User {} is already an admin", email),
                    Some(user_id),
                );
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Role lookup failed for user {}: {}", user_id, e),
        }

        // Clear leftovers so the insert cannot trip the unique constraint.
        match self.store.delete_roles(&user_id, Role::Admin).await {
            Ok(0) => {}
            Ok(n) => tracing::warn!("Removed {} stale admin rows for user {}", n, user_id),
            Err(e) => tracing::warn!("Failed to clear admin rows for user {}: {}", user_id, e),
        }

        if let Err(e) = self.store.insert_role(&user_id, Role::Admin).await {
            tracing::error!("Failed to insert admin role for user {}: {}", user_id, e);
            return AdminActionResult::failed(
                format!("Failed to assign admin role: {}", e.user_message()),
                Some(user_id),
            );
        }
        self.write_profile_role(&user_id, Role::Admin).await;

        tracing::info!("Promoted {} ({}) to admin", email, user_id);
        AdminActionResult::ok(
            format!("User {} has been promoted to admin", email),
            Some(user_id),
        )
    }

    async fn create(&self, email: &str, password: &str, name: Option<&str>) -> AdminActionResult {
        if password.is_empty() {
            return AdminActionResult::failed(
                "Password is required to create a new account",
                None,
            );
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.config.default_admin_name);
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            metadata: SignUpMetadata {
                name: name.to_string(),
                role: Role::Admin,
            },
        };

        let user = match self.auth.sign_up(&request).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("Sign-up failed for {}: {}", email, e);
                return AdminActionResult::failed(
                    format!("Failed to create admin user: {}", e.user_message()),
                    None,
                );
            }
        };
        tracing::info!("Created account {} for {}", user.id, email);

        // The profile row is created by a backend trigger after sign-up.
        tokio::time::sleep(self.config.profile_sync_delay).await;

        if let Err(e) = self.store.insert_role(&user.id, Role::Admin).await {
            tracing::warn!("Failed to insert admin role for new user {}: {}", user.id, e);
        }
        self.write_profile_role(&user.id, Role::Admin).await;

        AdminActionResult::ok(format!("Admin user {} created successfully", email), Some(user.id))
    }

    async fn write_profile_role(&self, user_id: &str, role: Role) {
        match self.store.update_profile_role(user_id, role).await {
            Ok(0) => tracing::warn!("No profile row to update for user {}", user_id),
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to update profile role for user {}: {}", user_id, e),
        }
    }
}
