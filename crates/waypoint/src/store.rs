//! Durable queue of pending telemetry events.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::storage::{keys, KeyValueStore};
use crate::types::Event;
use crate::Error;

/// Durable event queue, keyed by creation timestamp.
///
/// Every operation runs under one logical writer: concurrent callers are
/// serialized FIFO, and a read observes all writes queued before it.
#[derive(Clone)]
pub struct EventStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    kv: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl EventStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                kv,
                lock: Mutex::new(()),
            }),
        }
    }

    /// Append-or-merge a single event; an existing event with the same
    /// `created_at` is replaced (last-write-wins on that key).
    pub async fn add(&self, event: Event) -> Result<(), Error> {
        let _guard = self.inner.lock.lock().await;
        let mut events = self.load_or_heal()?;
        merge(&mut events, event);
        self.persist(&events)
    }

    /// Batch append-or-merge; used to commit a rewrite pass.
    pub async fn add_or_replace(&self, incoming: Vec<Event>) -> Result<(), Error> {
        let _guard = self.inner.lock.lock().await;
        let mut events = self.load_or_heal()?;
        for event in incoming {
            merge(&mut events, event);
        }
        self.persist(&events)
    }

    /// Remove the event with a matching `created_at`; a second removal of
    /// the same event is a no-op.
    pub async fn remove(&self, event: &Event) -> Result<(), Error> {
        let _guard = self.inner.lock.lock().await;
        let mut events = self.load_or_heal()?;
        events.retain(|stored| stored.created_at != event.created_at);
        self.persist(&events)
    }

    /// Snapshot of the current queue.
    ///
    /// An empty or never-written store reads as an empty list; a stored
    /// payload that fails to decode is [`Error::CorruptStore`].
    pub async fn events(&self) -> Result<Vec<Event>, Error> {
        let _guard = self.inner.lock.lock().await;
        match self.inner.kv.get(keys::CACHED_EVENTS)? {
            Some(raw) => serde_json::from_str(&raw).map_err(Error::CorruptStore),
            None => Ok(Vec::new()),
        }
    }

    /// Transform every stored event and commit the result as the new
    /// snapshot. The pass is atomic: readers see either the old list or the
    /// fully rewritten one.
    pub async fn rewrite<F>(&self, mut transform: F) -> Result<(), Error>
    where
        F: FnMut(Event) -> Event,
    {
        let _guard = self.inner.lock.lock().await;
        let events = match self.inner.kv.get(keys::CACHED_EVENTS)? {
            Some(raw) => serde_json::from_str::<Vec<Event>>(&raw).map_err(Error::CorruptStore)?,
            None => return Ok(()),
        };
        let rewritten: Vec<Event> = events.into_iter().map(&mut transform).collect();
        self.persist(&rewritten)
    }

    // Mutations heal a corrupt payload by starting over from an empty list;
    // otherwise the queue would be wedged forever. Reads stay strict.
    fn load_or_heal(&self) -> Result<Vec<Event>, Error> {
        match self.inner.kv.get(keys::CACHED_EVENTS)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(events) => Ok(events),
                Err(err) => {
                    warn!(error = %err, "resetting corrupt event store");
                    Ok(Vec::new())
                }
            },
            None => Ok(Vec::new()),
        }
    }

    fn persist(&self, events: &[Event]) -> Result<(), Error> {
        let raw = serde_json::to_string(events)?;
        self.inner.kv.set(keys::CACHED_EVENTS, &raw)
    }
}

fn merge(events: &mut Vec<Event>, incoming: Event) {
    match events
        .iter_mut()
        .find(|stored| stored.created_at == incoming.created_at)
    {
        Some(stored) => *stored = incoming,
        None => events.push(incoming),
    }
}
