use std::sync::Arc;

use rpush_types::{PushKey, PushOutcome};

use crate::registry::PushRegistry;

/// Observes each active push's terminal outcome and folds it into the
/// registry. Kept as its own type, separate from [`PushRegistry`], so
/// "who updates status on completion" has a concrete home distinct from
/// "who stores status".
#[derive(Clone)]
pub struct StatusRecorder {
    registry: Arc<PushRegistry>,
}

impl StatusRecorder {
    pub fn new(registry: Arc<PushRegistry>) -> Self {
        Self { registry }
    }

    /// Invoked by the job manager's completion notification for `key`.
    pub async fn on_completion(&self, key: PushKey, outcome: PushOutcome) {
        self.registry.record_outcome(key, outcome).await;
    }
}
