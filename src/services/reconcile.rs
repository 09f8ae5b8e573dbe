use crate::backend::RoleStore;
use crate::error::AdminResult;
use crate::models::Role;

/// Result of comparing a user's `user_roles` admin record with `profiles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    InSync,
    /// The record existed and the profile was rewritten to `admin`.
    Repaired,
    ProfileMissing,
    /// The profile says `admin` but no record backs it. Never auto-granted.
    UnbackedProfileAdmin,
}

/// Bring `profiles.role` in line with the `user_roles` admin record.
pub async fn reconcile_profile(
    store: &dyn RoleStore,
    user_id: &str,
) -> AdminResult<ReconcileOutcome> {
    let has_record = store.find_role(user_id, Role::Admin).await?.is_some();
    reconcile_with_record(store, user_id, has_record).await
}

/// Same as `reconcile_profile` when the caller already knows whether the
/// admin record exists.
pub async fn reconcile_with_record(
    store: &dyn RoleStore,
    user_id: &str,
    has_record: bool,
) -> AdminResult<ReconcileOutcome> {
    let Some(profile) = store.get_profile(user_id).await? else {
        tracing::debug!("No profile row for user {}", user_id);
        return Ok(ReconcileOutcome::ProfileMissing);
    };

    match (has_record, profile.is_admin()) {
        (true, false) => {
            store.update_profile_role(user_id, Role::Admin).await?;
            tracing::info!(
                "Repaired profile role for user {} (was {:?})",
                user_id,
                profile.role
            );
            Ok(ReconcileOutcome::Repaired)
        }
        (false, true) => {
            tracing::warn!(
                "Profile of user {} claims admin without a user_roles record",
                user_id
            );
            Ok(ReconcileOutcome::UnbackedProfileAdmin)
        }
        _ => Ok(ReconcileOutcome::InSync),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};

    #[tokio::test]
    async fn test_repairs_divergent_profile() {
        let backend = MemoryBackend::new();
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);

        let outcome = reconcile_profile(&backend, "u1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Repaired);
        assert!(backend.profile("u1").unwrap().is_admin());

        let outcome = reconcile_profile(&backend, "u1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::InSync);
    }

    #[tokio::test]
    async fn test_unbacked_profile_admin_is_not_granted() {
        let backend = MemoryBackend::new();
        backend.add_profile("u1", "a@x.com", Some(Role::Admin));

        let outcome = reconcile_profile(&backend, "u1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::UnbackedProfileAdmin);
        assert_eq!(backend.role_count("u1", Role::Admin), 0);
        assert_eq!(backend.call_count(Operation::UpdateProfileRole), 0);
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let backend = MemoryBackend::new();
        backend.add_role("u1", Role::Admin);
        let outcome = reconcile_profile(&backend, "u1").await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::ProfileMissing);
    }

    #[tokio::test]
    async fn test_store_fault_propagates() {
        let backend = MemoryBackend::new();
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);
        backend.fail(Operation::UpdateProfileRole, "permission denied");
        assert!(reconcile_profile(&backend, "u1").await.is_err());
    }
}
