//! Typed publish/subscribe channel between the session and the host view.
//!
//! Listeners are registered with [`EventBus::subscribe`] and stay active for
//! as long as the returned [`Subscription`] is alive.

use crate::route::ChapterRoute;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[ts(export)]
pub enum SessionEvent {
    Loading {
        #[ts(type = "number")]
        generation: u64,
        route: ChapterRoute,
    },
    Ready {
        #[ts(type = "number")]
        generation: u64,
        #[ts(type = "number")]
        quantity_pages: i64,
        current_page: usize,
    },
    Failed {
        #[ts(type = "number")]
        generation: u64,
        message: String,
    },
    /// A fetch resolved after a newer one was dispatched and was discarded.
    Stale {
        #[ts(type = "number")]
        generation: u64,
        #[ts(type = "number")]
        current: u64,
    },
    NeighborStatus {
        #[ts(type = "number")]
        generation: u64,
        next_downloaded: bool,
        prev_downloaded: bool,
    },
    PageChanged {
        #[ts(type = "number")]
        generation: u64,
        page: usize,
    },
    /// The host view must mount `route`.
    Navigate { route: ChapterRoute },
    PrefetchStarted { series_id: String, chapter_id: u32 },
    PrefetchFinished {
        series_id: String,
        chapter_id: u32,
        ok: bool,
    },
    LastReadSaved {
        series_id: String,
        chapter_id: u32,
        page: usize,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Loading { .. } => "loading",
            SessionEvent::Ready { .. } => "ready",
            SessionEvent::Failed { .. } => "failed",
            SessionEvent::Stale { .. } => "stale",
            SessionEvent::NeighborStatus { .. } => "neighbor-status",
            SessionEvent::PageChanged { .. } => "page-changed",
            SessionEvent::Navigate { .. } => "navigate",
            SessionEvent::PrefetchStarted { .. } => "prefetch-started",
            SessionEvent::PrefetchFinished { .. } => "prefetch-finished",
            SessionEvent::LastReadSaved { .. } => "last-read-saved",
        }
    }
}

type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut id = 0;
        if let Ok(mut registry) = self.registry.lock() {
            registry.next_id = registry.next_id.wrapping_add(1);
            id = registry.next_id;
            registry.listeners.push((id, Arc::new(listener)));
        }
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every live listener. Listeners run outside the
    /// registry lock so they may subscribe or unsubscribe themselves.
    pub fn publish(&self, event: &SessionEvent) {
        let listeners: Vec<Listener> = match self.registry.lock() {
            Ok(registry) => registry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.listeners.len())
            .unwrap_or(0)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`]; dropping it unsubscribes.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut registry) = registry.lock() {
                registry.listeners.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
