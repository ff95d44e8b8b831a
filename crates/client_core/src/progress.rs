use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::{ClientEvent, EventBus};

/// Start/stop indicator bracketing every dispatched call.
///
/// There is no reference counting: with overlapping calls the first `stop`
/// clears the indicator even though another call is still in flight.
pub trait ProgressSignal: Send + Sync {
    fn start(&self);
    fn stop(&self);
    fn is_active(&self) -> bool;
}

#[derive(Default)]
pub struct ProgressIndicator {
    active: AtomicBool,
    events: Option<EventBus>,
}

impl ProgressIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventBus) -> Self {
        Self {
            active: AtomicBool::new(false),
            events: Some(events),
        }
    }

    fn set(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
        if let Some(events) = &self.events {
            events.emit(ClientEvent::Progress { active });
        }
    }
}

impl ProgressSignal for ProgressIndicator {
    fn start(&self) {
        self.set(true);
    }

    fn stop(&self) {
        self.set(false);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
