use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use crate::{
    dispatcher::Dispatcher,
    events::{NotificationEvent, Navigator, NotificationSink},
    invalidator::SessionInvalidator,
    middleware::{AuthTokenInjector, ProgressMiddleware},
    progress::ProgressIndicator,
    reporter::FailureReporter,
    session::SessionStore,
};

/// Captures every notification and navigation in the order they happened.
#[derive(Default)]
pub(crate) struct Recorder {
    pub notifications: Mutex<Vec<NotificationEvent>>,
    pub navigations: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn notifications(&self) -> Vec<NotificationEvent> {
        self.notifications.lock().expect("notifications lock").clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().expect("navigations lock").clone()
    }
}

impl NotificationSink for Recorder {
    fn notify(&self, event: NotificationEvent) {
        self.notifications
            .lock()
            .expect("notifications lock")
            .push(event);
    }
}

impl Navigator for Recorder {
    fn force_navigate(&self, route: &str) {
        self.navigations
            .lock()
            .expect("navigations lock")
            .push(route.to_string());
    }
}

pub(crate) struct Harness {
    pub dispatcher: Dispatcher,
    pub session: SessionStore,
    pub recorder: Arc<Recorder>,
    pub progress: Arc<ProgressIndicator>,
}

/// Dispatcher with the standard hook chain, recording side effects instead of
/// rendering them.
pub(crate) fn harness(base_url: &str) -> Result<Harness> {
    let session = SessionStore::in_memory();
    let recorder = Arc::new(Recorder::default());
    let progress = Arc::new(ProgressIndicator::new());
    let invalidator = SessionInvalidator::new(session.clone(), recorder.clone());
    let reporter = FailureReporter::new(recorder.clone(), invalidator);
    let dispatcher = Dispatcher::builder(base_url, reporter)?
        .with_middleware(Arc::new(AuthTokenInjector::new(session.clone())))
        .with_middleware(Arc::new(ProgressMiddleware::new(progress.clone())))
        .build();
    Ok(Harness {
        dispatcher,
        session,
        recorder,
        progress,
    })
}

/// Serves `app` on an ephemeral local port and returns its `/api/` base url.
pub(crate) async fn spawn_api(app: Router) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/api/"))
}

/// Base url of a port nothing listens on.
pub(crate) async fn unreachable_api() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/api/"))
}
