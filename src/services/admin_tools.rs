use std::sync::Arc;

use crate::backend::{AuthProvider, RoleStore};
use crate::config::AdminConfig;
use crate::error::AdminResult;
use crate::models::Session;
use crate::services::admin_setup::{AdminActionResult, AdminSetup};
use crate::services::admin_status::{AdminDecision, AdminStatusResolver};
use crate::services::notify::{Notification, Notifier};
use crate::services::reconcile::ReconcileOutcome;

/// Entry points for UI code and the CLI. Nothing here returns an error for
/// the admin workflows themselves; outcomes are booleans plus a notification.
pub struct AdminTools {
    auth: Arc<dyn AuthProvider>,
    resolver: AdminStatusResolver,
    setup: AdminSetup,
    notifier: Arc<dyn Notifier>,
}

impl AdminTools {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn RoleStore>,
        notifier: Arc<dyn Notifier>,
        config: AdminConfig,
    ) -> Self {
        Self {
            resolver: AdminStatusResolver::new(store.clone(), &config),
            setup: AdminSetup::new(auth.clone(), store, config),
            auth,
            notifier,
        }
    }

    pub async fn current_session(&self) -> Option<Session> {
        match self.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Could not load session: {}", e);
                None
            }
        }
    }

    pub async fn admin_decision(&self) -> AdminDecision {
        let session = self.current_session().await;
        self.resolver.resolve(session.as_ref()).await
    }

    pub async fn check_admin_status(&self) -> bool {
        self.admin_decision().await.is_admin
    }

    pub async fn setup_admin_user(&self, email: &str, password: &str, name: Option<&str>) -> bool {
        let result = self.setup.create_admin_user(email, password, name).await;
        self.report("Admin setup", &result);
        result.success
    }

    pub async fn revoke_admin_user(&self, email: &str) -> bool {
        let result = self.setup.revoke_admin_user(email).await;
        self.report("Admin revocation", &result);
        result.success
    }

    pub async fn reconcile_profile(&self, user_id: &str) -> AdminResult<ReconcileOutcome> {
        self.setup.reconcile_profile(user_id).await
    }

    fn report(&self, action: &str, result: &AdminActionResult) {
        let notification = if result.success {
            Notification::success(action, result.message.clone())
        } else {
            Notification::error(format!("{} failed", action), result.message.clone())
        };
        self.notifier.notify(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Operation};
    use crate::models::Role;
    use crate::services::admin_status::DecisionSource;
    use crate::services::notify::NotificationKind;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    fn tools(backend: &Arc<MemoryBackend>, notifier: &Arc<RecordingNotifier>) -> AdminTools {
        let config = AdminConfig {
            profile_sync_delay: Duration::ZERO,
            ..AdminConfig::default()
        };
        AdminTools::new(backend.clone(), backend.clone(), notifier.clone(), config)
    }

    #[tokio::test]
    async fn test_check_uses_current_session() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        backend.add_user("u1", "a@x.com");
        backend.add_role("u1", Role::Admin);
        let tools = tools(&backend, &notifier);

        assert!(!tools.check_admin_status().await);

        backend.set_session(Some(Session::new("u1", Some("a@x.com".to_string()))));
        assert!(tools.check_admin_status().await);
        assert_eq!(tools.admin_decision().await.source, DecisionSource::RoleRecord);
    }

    #[tokio::test]
    async fn test_session_fault_is_not_admin() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        backend.add_role("u1", Role::Admin);
        backend.set_session(Some(Session::new("u1", None)));
        backend.fail(Operation::CurrentSession, "network down");

        let decision = tools(&backend, &notifier).admin_decision().await;
        assert!(!decision.is_admin);
        assert_eq!(decision.source, DecisionSource::NoSession);
    }

    #[tokio::test]
    async fn test_setup_notifies_success() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());

        assert!(tools(&backend, &notifier)
            .setup_admin_user("new@x.com", "secret", None)
            .await);

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NotificationKind::Success);
        assert!(seen[0].message.contains("new@x.com"));
    }

    #[tokio::test]
    async fn test_setup_notifies_failure() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        backend.fail(Operation::SignUp, "rate limited");

        assert!(!tools(&backend, &notifier)
            .setup_admin_user("new@x.com", "secret", None)
            .await);

        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen[0].kind, NotificationKind::Error);
        assert_eq!(seen[0].title, "Admin setup failed");
        assert!(seen[0].message.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_revoke_notifies() {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = Arc::new(RecordingNotifier::default());
        backend.add_user("u1", "only@x.com");
        backend.add_role("u1", Role::Admin);

        assert!(!tools(&backend, &notifier).revoke_admin_user("only@x.com").await);
        let seen = notifier.seen.lock().unwrap();
        assert_eq!(seen[0].title, "Admin revocation failed");
    }
}
