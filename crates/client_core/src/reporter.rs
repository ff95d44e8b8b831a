use std::sync::Arc;

use tracing::debug;

use crate::{
    classifier::{classify, error_class, Action, ErrorEnvelope},
    events::NotificationSink,
    invalidator::SessionInvalidator,
};

/// Runs the side effects of a classified failure: exactly one notification,
/// plus session teardown on expiry.
#[derive(Clone)]
pub struct FailureReporter {
    notifier: Arc<dyn NotificationSink>,
    invalidator: SessionInvalidator,
}

impl FailureReporter {
    pub fn new(notifier: Arc<dyn NotificationSink>, invalidator: SessionInvalidator) -> Self {
        Self {
            notifier,
            invalidator,
        }
    }

    pub async fn report(&self, envelope: &ErrorEnvelope) -> Action {
        let action = classify(envelope);
        debug!(class = ?error_class(envelope), ?action, "classified failed request");
        self.apply(&action).await;
        action
    }

    pub async fn apply(&self, action: &Action) {
        self.notifier.notify(action.notification());
        if action.invalidates_session() {
            self.invalidator.invalidate().await;
        }
    }
}
