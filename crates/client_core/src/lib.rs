use std::sync::Arc;

use anyhow::{Context, Result};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::info;

pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod invalidator;
pub mod middleware;
pub mod progress;
pub mod reporter;
pub mod session;
pub mod storefront;

pub use classifier::{classify, Action, ErrorEnvelope};
pub use config::{load_settings, ClientSettings};
pub use dispatcher::{Dispatcher, HttpMethod, ParamValue, RequestContext};
pub use error::DispatchError;
pub use events::{ClientEvent, EventBus, NotificationEvent, Severity};
pub use progress::{ProgressIndicator, ProgressSignal};
pub use session::{KeyValueStore, MemoryStore, Session, SessionStore};
pub use storefront::{CartView, StorefrontClient, StorefrontError};

use invalidator::SessionInvalidator;
use middleware::{AuthTokenInjector, ProgressMiddleware};
use reporter::FailureReporter;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One dispatcher, one session and one event stream, wired the way every
/// storefront surface uses them.
#[derive(Clone)]
pub struct ClientCore {
    pub dispatcher: Dispatcher,
    pub session: SessionStore,
    pub progress: Arc<ProgressIndicator>,
    pub storefront: StorefrontClient,
    events: EventBus,
}

impl ClientCore {
    /// Opens the durable client state and wires the core against `api_url`.
    pub async fn connect(settings: &ClientSettings) -> Result<Self> {
        let storage = Storage::new(&settings.state_database_url)
            .await
            .with_context(|| {
                format!(
                    "failed to open client state at '{}'",
                    settings.state_database_url
                )
            })?;
        info!(api_url = %settings.api_url, "client core ready");
        Self::assemble(&settings.api_url, Arc::new(storage))
    }

    /// Header injection runs before progress start; progress stops before
    /// failures are classified.
    pub fn assemble(api_url: &str, backend: Arc<dyn KeyValueStore>) -> Result<Self> {
        let session = SessionStore::new(backend);
        let events = EventBus::new(EVENT_CHANNEL_CAPACITY);
        let progress = Arc::new(ProgressIndicator::with_events(events.clone()));

        let invalidator = SessionInvalidator::new(session.clone(), Arc::new(events.clone()));
        let reporter = FailureReporter::new(Arc::new(events.clone()), invalidator);
        let dispatcher = Dispatcher::builder(api_url, reporter)
            .with_context(|| format!("invalid api url '{api_url}'"))?
            .with_middleware(Arc::new(AuthTokenInjector::new(session.clone())))
            .with_middleware(Arc::new(ProgressMiddleware::new(progress.clone())))
            .build();
        let storefront =
            StorefrontClient::new(dispatcher.clone(), session.clone(), Arc::new(events.clone()));

        Ok(Self {
            dispatcher,
            session,
            progress,
            storefront,
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
