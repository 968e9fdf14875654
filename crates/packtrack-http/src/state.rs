use std::sync::Arc;

use packtrack_core::{
    intake::{ChatLocks, IntakeService},
    registration::RegistrationService,
    scheduler::ReconcileScheduler,
};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: ReconcileScheduler,
    pub intake: Arc<IntakeService>,
    pub registration: Arc<RegistrationService>,
    /// Shared with the long-polling adapter so one chat is never handled twice
    /// at once.
    pub chat_locks: Arc<ChatLocks>,
    /// Bearer secret for the reconciliation trigger.
    pub cron_secret: Arc<str>,
}
