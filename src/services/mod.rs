pub mod admin_setup;
pub mod admin_status;
pub mod admin_tools;
pub mod notify;
pub mod reconcile;

pub use admin_setup::{AdminActionResult, AdminSetup};
pub use admin_status::{
    combine_fallback_signals, AdminDecision, AdminStatusResolver, DecisionSource,
    FallbackSignals,
};
pub use admin_tools::AdminTools;
pub use notify::{ConsoleNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use reconcile::{reconcile_profile, ReconcileOutcome};
