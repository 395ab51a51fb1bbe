//! Routing table built once by the bus builder and read on every publish.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::{
    events::EnrichedEvent,
    queues::{FifoDropOldestQueue, IsolatedForwarder, Latest1Queue},
};

/// Event type to every inbox subscribed to it.
pub struct Routes {
    table: HashMap<&'static str, Vec<Route>>,
}

impl Routes {
    pub(crate) fn new(table: HashMap<&'static str, Vec<Route>>) -> Self {
        Self { table }
    }

    /// Inboxes for `event_type`, or `None` when nobody subscribed to it.
    pub fn for_type(&self, event_type: &str) -> Option<&[Route]> {
        self.table.get(event_type).map(Vec::as_slice)
    }

    /// Events a subscriber failed to receive, summed over its inputs.
    pub fn drops_for(&self, subscriber_id: &str) -> u64 {
        self.table
            .values()
            .flatten()
            .filter(|r| r.subscriber_id == subscriber_id)
            .map(Route::drops)
            .sum()
    }
}

pub struct Route {
    subscriber_id: &'static str,
    inbox: RouteInbox,
    drops: AtomicU64,
}

pub enum RouteInbox {
    Latest1(Arc<Latest1Queue<Arc<EnrichedEvent>>>),
    FifoDropOldest(Arc<FifoDropOldestQueue<Arc<EnrichedEvent>>>),
    Isolated(IsolatedForwarder<Arc<EnrichedEvent>>),
}

impl Route {
    pub(crate) fn new(subscriber_id: &'static str, inbox: RouteInbox) -> Self {
        Self {
            subscriber_id,
            inbox,
            drops: AtomicU64::new(0),
        }
    }

    pub fn subscriber_id(&self) -> &'static str {
        self.subscriber_id
    }

    /// Hands `event` to the inbox. Returns false, and counts a drop, when
    /// the event or an older one it displaced was lost. Replacing a
    /// `Latest1` snapshot is not a drop.
    pub fn deliver(&self, event: Arc<EnrichedEvent>) -> bool {
        let delivered = match &self.inbox {
            RouteInbox::Latest1(q) => {
                q.set(event);
                true
            }
            RouteInbox::FifoDropOldest(q) => !q.push_overwrite(event),
            RouteInbox::Isolated(fwd) => fwd.try_send(event).is_ok(),
        };
        if !delivered {
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    pub fn drops(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}
