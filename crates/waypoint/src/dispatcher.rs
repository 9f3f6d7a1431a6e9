//! Lifecycle-driven event generation and delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::context::SessionContext;
use crate::storage::{self, keys, KeyValueStore};
use crate::store::EventStore;
use crate::transport::Transport;
use crate::types::{Event, EventKind};
use crate::Error;

/// Inactivity, in seconds, after which an app start counts as a
/// reactivation (seven days).
const REACTIVATION_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Produces telemetry events from lifecycle triggers, attaches timing and
/// link information as it becomes available, and drives delivery.
pub struct EventDispatcher {
    transport: Arc<dyn Transport>,
    store: EventStore,
    kv: Arc<dyn KeyValueStore>,
    context: Arc<SessionContext>,
    flush_leeway: Duration,
    link_for_future_actions: parking_lot::Mutex<Option<String>>,
}

impl EventDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: EventStore,
        kv: Arc<dyn KeyValueStore>,
        context: Arc<SessionContext>,
        flush_leeway: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            kv,
            context,
            flush_leeway,
            link_for_future_actions: parking_lot::Mutex::new(None),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Record the events owed at every SDK construction: `app_open` always,
    /// `install`/`reinstall` on a first open, `reactivation` after seven
    /// days away. Updates the opens counter and last-start timestamp.
    pub async fn record_startup_events(&self) -> Result<(), Error> {
        self.record_startup_events_at(Utc::now()).await
    }

    pub(crate) async fn record_startup_events_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let number_of_opens = storage::read_i64(&*self.kv, keys::NUMBER_OF_OPENS);

        if number_of_opens == 0 {
            // A durable session id on a first open means the SDK ran on
            // this device before: a reinstall, not an install.
            let kind = if self.context.session_id().is_some() {
                EventKind::Reinstall
            } else {
                EventKind::Install
            };
            self.store.add(Event::new(kind, now)).await?;
        }

        let last_start = storage::read_i64(&*self.kv, keys::LAST_START_TIMESTAMP);
        if last_start != 0 && now.timestamp() - last_start >= REACTIVATION_WINDOW_SECS {
            // Store identity is the creation timestamp, so each startup
            // event needs its own instant.
            let created_at = now + chrono::Duration::microseconds(1);
            self.store
                .add(Event::new(EventKind::Reactivation, created_at))
                .await?;
        }

        storage::write_i64(&*self.kv, keys::NUMBER_OF_OPENS, number_of_opens + 1);
        storage::write_i64(&*self.kv, keys::LAST_START_TIMESTAMP, now.timestamp());

        let created_at = now + chrono::Duration::microseconds(2);
        self.store
            .add(Event::new(EventKind::AppOpen, created_at))
            .await?;
        Ok(())
    }

    /// Foreground transition: settle engagement time for the previous
    /// session, flush `time_spent` events, open a fresh `time_spent` event,
    /// and schedule the first-batch flush of everything else.
    pub async fn handle_became_active(&self) {
        self.handle_became_active_at(Utc::now()).await;
        self.schedule_first_batch_flush();
    }

    pub(crate) async fn handle_became_active_at(&self, now: DateTime<Utc>) {
        let resign = storage::read_i64(&*self.kv, keys::RESIGN_TIMESTAMP);
        if resign != 0 {
            let elapsed = now.timestamp() - resign;
            if elapsed > 0 {
                let result = self
                    .store
                    .rewrite(|mut event| {
                        if event.kind == EventKind::TimeSpent
                            && event.engagement_time.is_none()
                        {
                            event.engagement_time = Some(elapsed);
                        }
                        event
                    })
                    .await;
                if let Err(err) = result {
                    warn!(error = %err, "failed to stamp engagement time");
                }
            }
            self.flush_time_spent().await;
        }

        if let Err(err) = self.store.add(Event::new(EventKind::TimeSpent, now)).await {
            warn!(error = %err, "failed to record time-spent event");
        }
    }

    /// Background transition: remember when we left the foreground.
    pub fn handle_will_resign_active(&self) {
        self.handle_will_resign_active_at(Utc::now());
    }

    pub(crate) fn handle_will_resign_active_at(&self, now: DateTime<Utc>) {
        storage::write_i64(&*self.kv, keys::RESIGN_TIMESTAMP, now.timestamp());
    }

    /// Remember the link to attach to future events; when set, also attach
    /// it to already-stored events that are missing one and flush.
    pub async fn set_link_for_future_actions(&self, link: Option<String>) {
        *self.link_for_future_actions.lock() = link.clone();

        let Some(link) = link else { return };
        let result = self
            .store
            .rewrite(|mut event| {
                if event.link.is_none() {
                    event.link = Some(link.clone());
                }
                event
            })
            .await;
        if let Err(err) = result {
            warn!(error = %err, "failed to attach link to stored events");
        }

        self.flush_normal().await;
    }

    /// Queue an event and trigger delivery of the non-`time_spent` backlog.
    pub async fn log(&self, mut event: Event) {
        if event.link.is_none() {
            event.link = self.link_for_future_actions.lock().clone();
        }

        if let Err(err) = self.store.add(event).await {
            warn!(error = %err, "failed to queue event");
            return;
        }

        self.flush_normal().await;
    }

    pub async fn flush_normal(&self) {
        flush_partition(&self.transport, &self.store, false).await;
    }

    pub async fn flush_time_spent(&self) {
        flush_partition(&self.transport, &self.store, true).await;
    }

    // The first batch after a foreground transition waits out a leeway so
    // bursts of startup activity go out as one cycle.
    fn schedule_first_batch_flush(&self) {
        let transport = Arc::clone(&self.transport);
        let store = self.store.clone();
        let leeway = self.flush_leeway;

        tokio::spawn(async move {
            tokio::time::sleep(leeway).await;
            debug!("running first-batch flush");
            flush_partition(&transport, &store, false).await;
        });
    }
}

/// Deliver one partition of the queue: one request per event, all awaited
/// before returning, removing exactly the acknowledged events. The store is
/// never locked across the network wait.
async fn flush_partition(transport: &Arc<dyn Transport>, store: &EventStore, time_spent: bool) {
    let events = match store.events().await {
        Ok(events) => events,
        Err(err) => {
            warn!(error = %err, "skipping flush, event queue unreadable");
            return;
        }
    };

    let batch: Vec<Event> = events
        .into_iter()
        .filter(|event| (event.kind == EventKind::TimeSpent) == time_spent)
        .collect();
    if batch.is_empty() {
        return;
    }

    info!(count = batch.len(), time_spent, "sending events");

    let outcomes = join_all(batch.iter().map(|event| {
        let transport = Arc::clone(transport);
        async move { transport.send_event(event).await.unwrap_or(false) }
    }))
    .await;

    for (event, delivered) in batch.iter().zip(outcomes) {
        if !delivered {
            continue;
        }
        if let Err(err) = store.remove(event).await {
            warn!(error = %err, "failed to drop acknowledged event");
        }
    }
}
