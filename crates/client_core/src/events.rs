//! Client-side events surfaced to whatever renders the storefront.
//!
//! The core never renders anything itself. Notifications, forced navigation
//! and progress changes are handed to the seams below; [`EventBus`] implements
//! all of them on top of one broadcast channel.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub message: String,
    pub severity: Severity,
}

impl NotificationEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Notification(NotificationEvent),
    Navigation { route: String },
    Progress { active: bool },
}

/// Fire-and-forget sink for user-facing notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Performs a full navigation, discarding any protected view.
pub trait Navigator: Send + Sync {
    fn force_navigate(&self, route: &str);
}

#[derive(Clone)]
pub struct EventBus {
    events: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: ClientEvent) {
        // No subscribers is fine; nobody is rendering.
        let _ = self.events.send(event);
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, event: NotificationEvent) {
        self.emit(ClientEvent::Notification(event));
    }
}

impl Navigator for EventBus {
    fn force_navigate(&self, route: &str) {
        self.emit(ClientEvent::Navigation {
            route: route.to_string(),
        });
    }
}
