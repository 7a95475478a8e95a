use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::presentation::lock_recovering;

pub const DEFAULT_LOAD_LATENCY_TICKS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadComplete {
    pub scene: String,
    pub sequence: u64,
}

#[derive(Debug, Default)]
struct LoadEventsInner {
    next_subscriber: u64,
    queues: HashMap<u64, VecDeque<LoadComplete>>,
}

/// Fan-out of "scene load complete" notifications.
#[derive(Debug, Clone, Default)]
pub struct LoadEvents {
    inner: Arc<Mutex<LoadEventsInner>>,
}

impl LoadEvents {
    pub fn subscribe(&self) -> LoadSubscription {
        let mut inner = lock_recovering(&self.inner, "load_events_subscribe");
        let id = inner.next_subscriber;
        inner.next_subscriber = inner.next_subscriber.saturating_add(1);
        inner.queues.insert(id, VecDeque::new());
        LoadSubscription {
            id,
            events: self.clone(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock_recovering(&self.inner, "load_events_count").queues.len()
    }

    pub(crate) fn publish(&self, complete: &LoadComplete) {
        let mut inner = lock_recovering(&self.inner, "load_events_publish");
        for queue in inner.queues.values_mut() {
            queue.push_back(complete.clone());
        }
    }

    fn take_next(&self, id: u64) -> Option<LoadComplete> {
        let mut inner = lock_recovering(&self.inner, "load_events_take");
        inner.queues.get_mut(&id).and_then(VecDeque::pop_front)
    }

    fn unsubscribe(&self, id: u64) {
        lock_recovering(&self.inner, "load_events_unsubscribe")
            .queues
            .remove(&id);
    }
}

/// Receives every load-complete notification published after it was created.
/// Unsubscribes when dropped.
#[derive(Debug)]
pub struct LoadSubscription {
    id: u64,
    events: LoadEvents,
}

impl LoadSubscription {
    pub fn try_next(&self) -> Option<LoadComplete> {
        self.events.take_next(self.id)
    }
}

impl Drop for LoadSubscription {
    fn drop(&mut self) {
        self.events.unsubscribe(self.id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingLoad {
    destination: String,
    ticks_remaining: u32,
}

/// Outstanding scene load requests. Loading is asynchronous: a request is
/// handed to the director after the configured latency, and completion is
/// announced on [`LoadEvents`].
#[derive(Debug)]
pub struct SceneLoadQueue {
    pending: Option<PendingLoad>,
    latency_ticks: u32,
    next_sequence: u64,
    events: LoadEvents,
}

impl Default for SceneLoadQueue {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_LATENCY_TICKS)
    }
}

impl SceneLoadQueue {
    pub fn new(latency_ticks: u32) -> Self {
        Self {
            pending: None,
            latency_ticks,
            next_sequence: 0,
            events: LoadEvents::default(),
        }
    }

    /// Requests a load of `destination`. An empty destination is a no-op and
    /// returns `false`. A newer request replaces one that has not started yet.
    pub fn request_load(&mut self, destination: &str) -> bool {
        let destination = destination.trim();
        if destination.is_empty() {
            debug!("load_request_ignored_empty_destination");
            return false;
        }
        if let Some(previous) = &self.pending {
            if previous.destination != destination {
                warn!(
                    previous = previous.destination.as_str(),
                    next = destination,
                    "load_request_superseded"
                );
            }
        }
        info!(destination, "load_requested");
        self.pending = Some(PendingLoad {
            destination: destination.to_string(),
            ticks_remaining: self.latency_ticks,
        });
        true
    }

    pub fn pending_destination(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|pending| pending.destination.as_str())
    }

    pub fn subscribe(&self) -> LoadSubscription {
        self.events.subscribe()
    }

    pub fn events(&self) -> &LoadEvents {
        &self.events
    }

    /// Advances the pending request by one tick and returns its destination
    /// once it is due.
    pub(crate) fn poll_due(&mut self) -> Option<String> {
        let pending = self.pending.as_mut()?;
        if pending.ticks_remaining > 0 {
            pending.ticks_remaining -= 1;
            return None;
        }
        self.pending.take().map(|pending| pending.destination)
    }

    pub(crate) fn announce_complete(&mut self, scene: &str) -> LoadComplete {
        let complete = LoadComplete {
            scene: scene.to_string(),
            sequence: self.next_sequence,
        };
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.events.publish(&complete);
        complete
    }
}
