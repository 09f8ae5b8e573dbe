//! Admin status resolution.
//!
//! Signals are consulted in order:
//! 1. no session: not admin
//! 2. a `user_roles` admin record: admin, nothing else is consulted
//! 3. the `is_admin()` privilege check; a fault denies outright
//! 4. `profiles.role == "admin"`
//!
//! Steps 3 and 4 are OR-ed by `combine_fallback_signals`. Step 2 alone is
//! enough to grant, while a negative step 2 never denies on its own.

use std::sync::Arc;

use crate::backend::RoleStore;
use crate::config::AdminConfig;
use crate::models::{Role, Session};
use crate::services::reconcile::reconcile_with_record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    NoSession,
    RoleRecord,
    PrivilegeCheck,
    ProfileRole,
    PrivilegeCheckFailed,
    NotAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminDecision {
    pub is_admin: bool,
    pub source: DecisionSource,
}

impl AdminDecision {
    fn granted(source: DecisionSource) -> Self {
        Self {
            is_admin: true,
            source,
        }
    }

    fn denied(source: DecisionSource) -> Self {
        Self {
            is_admin: false,
            source,
        }
    }
}

/// Signals consulted once the role record lookup misses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackSignals {
    pub privilege_check: bool,
    pub profile_role: bool,
}

pub fn combine_fallback_signals(signals: FallbackSignals) -> AdminDecision {
    if signals.privilege_check {
        AdminDecision::granted(DecisionSource::PrivilegeCheck)
    } else if signals.profile_role {
        AdminDecision::granted(DecisionSource::ProfileRole)
    } else {
        AdminDecision::denied(DecisionSource::NotAdmin)
    }
}

pub struct AdminStatusResolver {
    store: Arc<dyn RoleStore>,
    repair_profile_on_read: bool,
}

impl AdminStatusResolver {
    pub fn new(store: Arc<dyn RoleStore>, config: &AdminConfig) -> Self {
        Self {
            store,
            repair_profile_on_read: config.repair_profile_on_read,
        }
    }

    /// Never fails: every fault counts as a missing signal.
    pub async fn check_admin_status(&self, session: Option<&Session>) -> bool {
        self.resolve(session).await.is_admin
    }

    pub async fn resolve(&self, session: Option<&Session>) -> AdminDecision {
        let Some(session) = session else {
            tracing::debug!("No active session, not an admin");
            return AdminDecision::denied(DecisionSource::NoSession);
        };
        let user_id = session.user_id.as_str();

        match self.store.find_role(user_id, Role::Admin).await {
            Ok(Some(_)) => {
                tracing::debug!("User {} has an admin role record", user_id);
                if self.repair_profile_on_read {
                    self.repair_profile(user_id).await;
                }
                return AdminDecision::granted(DecisionSource::RoleRecord);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Role lookup failed for user {}: {}", user_id, e),
        }

        let privilege_check = match self.store.is_admin_rpc(session).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Privilege check failed for user {}: {}", user_id, e);
                return AdminDecision::denied(DecisionSource::PrivilegeCheckFailed);
            }
        };

        let profile_role = match self.store.get_profile(user_id).await {
            Ok(profile) => profile.is_some_and(|p| p.is_admin()),
            Err(e) => {
                tracing::warn!("Profile lookup failed for user {}: {}", user_id, e);
                false
            }
        };

        let decision = combine_fallback_signals(FallbackSignals {
            privilege_check,
            profile_role,
        });
        tracing::debug!(
            "Admin status for user {}: {} ({:?})",
            user_id,
            decision.is_admin,
            decision.source
        );
        decision
    }

    async fn repair_profile(&self, user_id: &str) {
        if let Err(e) = reconcile_with_record(self.store.as_ref(), user_id, true).await {
            tracing::warn!("Profile repair failed for user {}: {}", user_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};

    fn resolver(backend: &Arc<MemoryBackend>, repair: bool) -> AdminStatusResolver {
        let config = AdminConfig {
            repair_profile_on_read: repair,
            ..AdminConfig::default()
        };
        AdminStatusResolver::new(backend.clone(), &config)
    }

    fn session(user_id: &str) -> Session {
        Session::new(user_id, None).with_access_token("token")
    }

    #[test]
    fn test_combine_fallback_signals() {
        let cases = [
            (false, false, false, DecisionSource::NotAdmin),
            (true, false, true, DecisionSource::PrivilegeCheck),
            (false, true, true, DecisionSource::ProfileRole),
            (true, true, true, DecisionSource::PrivilegeCheck),
        ];
        for (privilege_check, profile_role, expected, source) in cases {
            let decision = combine_fallback_signals(FallbackSignals {
                privilege_check,
                profile_role,
            });
            assert_eq!(decision.is_admin, expected);
            assert_eq!(decision.source, source);
        }
    }

    #[tokio::test]
    async fn test_no_session_is_never_admin() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);
        backend.grant_rpc_admin("u1");

        let decision = resolver(&backend, false).resolve(None).await;
        assert_eq!(decision.source, DecisionSource::NoSession);
        assert!(!decision.is_admin);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_role_record_short_circuits() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);
        backend.fail(Operation::IsAdminRpc, "should not be called");

        let decision = resolver(&backend, false).resolve(Some(&session("u1"))).await;
        assert!(decision.is_admin);
        assert_eq!(decision.source, DecisionSource::RoleRecord);
        assert_eq!(backend.call_count(Operation::IsAdminRpc), 0);
        assert_eq!(backend.call_count(Operation::GetProfile), 0);
    }

    #[tokio::test]
    async fn test_role_record_repairs_profile_on_read() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);

        assert!(resolver(&backend, true).check_admin_status(Some(&session("u1"))).await);
        assert!(backend.profile("u1").unwrap().is_admin());
    }

    #[tokio::test]
    async fn test_repair_failure_does_not_change_decision() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);
        backend.fail(Operation::UpdateProfileRole, "permission denied");

        assert!(resolver(&backend, true).check_admin_status(Some(&session("u1"))).await);
    }

    #[tokio::test]
    async fn test_fallback_truth_table() {
        for privilege_check in [false, true] {
            for profile_admin in [false, true] {
                let backend = Arc::new(MemoryBackend::new());
                backend.add_user("u1", "a@x.com");
                if privilege_check {
                    backend.grant_rpc_admin("u1");
                }
                if profile_admin {
                    backend.set_profile_role("u1", Some(Role::Admin));
                }

                let is_admin = resolver(&backend, true)
                    .check_admin_status(Some(&session("u1")))
                    .await;
                assert_eq!(
                    is_admin,
                    privilege_check || profile_admin,
                    "privilege_check={} profile_admin={}",
                    privilege_check,
                    profile_admin
                );
            }
        }
    }

    #[tokio::test]
    async fn test_privilege_check_fault_fails_closed() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.set_profile_role("u1", Some(Role::Admin));
        backend.fail(Operation::IsAdminRpc, "function is_admin() does not exist");

        let decision = resolver(&backend, false).resolve(Some(&session("u1"))).await;
        assert!(!decision.is_admin);
        assert_eq!(decision.source, DecisionSource::PrivilegeCheckFailed);
        assert_eq!(backend.call_count(Operation::GetProfile), 0);
    }

    #[tokio::test]
    async fn test_role_lookup_fault_falls_through() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.grant_rpc_admin("u1");
        backend.fail(Operation::FindRole, "timeout");

        let decision = resolver(&backend, false).resolve(Some(&session("u1"))).await;
        assert!(decision.is_admin);
        assert_eq!(decision.source, DecisionSource::PrivilegeCheck);
    }

    #[tokio::test]
    async fn test_profile_fault_is_absent_signal() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user("u1", "a@x.com");
        backend.fail(Operation::GetProfile, "timeout");

        let decision = resolver(&backend, false).resolve(Some(&session("u1"))).await;
        assert!(!decision.is_admin);
        assert_eq!(decision.source, DecisionSource::NotAdmin);
    }
}
