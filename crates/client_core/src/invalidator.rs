use std::sync::Arc;

use tracing::{info, warn};

use crate::{events::Navigator, session::SessionStore};

/// Anonymous landing route every expired session is sent back to.
pub const LANDING_ROUTE: &str = "/";

#[derive(Clone)]
pub struct SessionInvalidator {
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
}

impl SessionInvalidator {
    pub fn new(session: SessionStore, navigator: Arc<dyn Navigator>) -> Self {
        Self { session, navigator }
    }

    /// Clears token and user record, then forces navigation to `/`.
    /// Calling it without a session only navigates.
    pub async fn invalidate(&self) {
        if let Err(error) = self.session.clear().await {
            warn!(%error, "failed to clear persisted session");
        }
        self.navigator.force_navigate(LANDING_ROUTE);
        info!(route = LANDING_ROUTE, "session invalidated");
    }
}
