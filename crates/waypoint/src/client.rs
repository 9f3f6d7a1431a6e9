//! Waypoint client implementation.

use std::sync::Arc;

use chrono::Utc;

use crate::config::{Config, WaypointBuilder};
use crate::context::SessionContext;
use crate::dispatcher::EventDispatcher;
use crate::manager::SessionManager;
use crate::storage::{KeyValueStore, MemoryStore, SecureStore};
use crate::store::EventStore;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Event, EventKind, LinkRequest, Notification, Payload};
use crate::Error;

/// Waypoint deep-linking and attribution client.
///
/// Construction records the startup telemetry (app-open, install/reinstall,
/// reactivation); [`Waypoint::authenticate`] then performs the backend
/// handshake that unlocks URL handling, payload fetches and attribute sync.
/// Everything that arrives earlier is buffered and replayed once the
/// handshake succeeds.
///
/// # Example
///
/// ```rust,ignore
/// use waypoint::{AppDetails, Waypoint};
///
/// #[tokio::main]
/// async fn main() -> Result<(), waypoint::Error> {
///     let client = Waypoint::builder("wp_xxx")
///         .uri_scheme("myapp://")
///         .app_details(AppDetails {
///             bundle: "com.example.app".into(),
///             version: "1.4.2".into(),
///             ..AppDetails::default()
///         })
///         .build()
///         .await?;
///
///     client.authenticate().await;
///     client.handle_open_url("myapp://promo/spring").await;
///
///     if let Some(payload) = client.last_payload().await {
///         println!("deep link payload: {payload:?}");
///     }
///     Ok(())
/// }
/// ```
pub struct Waypoint {
    config: Config,
    dispatcher: Arc<EventDispatcher>,
    manager: Arc<SessionManager>,
}

impl Waypoint {
    /// Create a new builder with the given API key.
    pub fn builder(api_key: impl Into<String>) -> WaypointBuilder {
        WaypointBuilder::new(api_key)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the authentication handshake; `false` on misconfiguration or a
    /// rejected handshake. The host may call again; no retry is scheduled.
    pub async fn authenticate(&self) -> bool {
        self.manager.authenticate().await
    }

    /// Enable or disable the SDK. While disabled, URL handling, link
    /// generation and payload fetches are off; telemetry still queues.
    pub fn set_enabled(&self, enabled: bool) {
        self.manager.set_enabled(enabled);
    }

    // ============================================
    // USER IDENTITY
    // ============================================

    /// The identifier for the current user.
    pub fn identifier(&self) -> Option<String> {
        self.manager.context().identifier()
    }

    /// Set the identifier for the current user and sync it to the backend.
    pub async fn set_identifier(&self, identifier: Option<String>) {
        self.manager.set_identifier(identifier).await;
    }

    /// The attributes for the current user.
    pub fn attributes(&self) -> Option<Payload> {
        self.manager.context().attributes()
    }

    /// Set the attributes for the current user and sync them to the backend.
    pub async fn set_attributes(&self, attributes: Option<Payload>) {
        self.manager.set_attributes(attributes).await;
    }

    /// The push notification token.
    pub fn push_token(&self) -> Option<String> {
        self.manager.context().push_token()
    }

    /// Set the push notification token and sync it to the backend.
    pub async fn set_push_token(&self, push_token: Option<String>) {
        self.manager.set_push_token(push_token).await;
    }

    // ============================================
    // LINKS & PAYLOADS
    // ============================================

    /// Generate a link; `None` while disabled, unauthenticated, or on a
    /// backend failure.
    pub async fn generate_link(&self, request: &LinkRequest) -> Option<String> {
        self.manager.generate_link(request).await
    }

    /// The most recently received payload. Resolves once authentication has
    /// succeeded and the platform launch forwards have run; each call is
    /// answered exactly once.
    pub async fn last_payload(&self) -> Option<Payload> {
        self.manager.last_payload().await
    }

    /// Every payload received since process start, under the same gating as
    /// [`Waypoint::last_payload`].
    pub async fn all_payloads_since_startup(&self) -> Vec<Payload> {
        self.manager.all_payloads_since_startup().await
    }

    // ============================================
    // PLATFORM LAUNCH FORWARDS
    // ============================================

    /// Forward an opened URL (custom scheme).
    pub async fn handle_open_url(&self, url: &str) {
        self.manager.handle_open_url(url).await;
    }

    /// Forward a continued user activity (universal link).
    pub async fn handle_continue_activity(&self, url: &str) {
        self.manager.handle_continue_activity(url).await;
    }

    /// Forward scene connection options; pass the URLs they carried, or an
    /// empty list when there were none.
    pub async fn handle_scene_connection(&self, urls: Vec<String>) {
        self.manager.handle_scene_connection(urls).await;
    }

    // ============================================
    // APP LIFECYCLE
    // ============================================

    /// Signal that the application entered the foreground.
    pub async fn application_did_become_active(&self) {
        self.dispatcher.handle_became_active().await;
        self.manager.refresh_device_data().await;
    }

    /// Signal that the application is about to leave the foreground.
    pub fn application_will_resign_active(&self) {
        self.dispatcher.handle_will_resign_active();
    }

    // ============================================
    // TELEMETRY
    // ============================================

    /// Queue an event of the given kind, stamped now. Use this to report
    /// view/open events for content the host renders itself.
    pub async fn log_event(&self, kind: EventKind) {
        self.dispatcher.log(Event::new(kind, Utc::now())).await;
    }

    /// Attempt delivery of everything currently queued.
    pub async fn flush(&self) {
        self.dispatcher.flush_normal().await;
        self.dispatcher.flush_time_spent().await;
    }

    /// Number of events queued for delivery.
    pub async fn pending_event_count(&self) -> usize {
        self.dispatcher
            .store()
            .events()
            .await
            .map(|events| events.len())
            .unwrap_or(0)
    }

    // ============================================
    // NOTIFICATIONS
    // ============================================

    /// List notifications for the given page; `None` on failure.
    pub async fn notifications(&self, page: u32) -> Option<Vec<Notification>> {
        self.manager.notifications(page).await
    }

    /// Number of unread notifications; `None` on failure.
    pub async fn unread_notification_count(&self) -> Option<u64> {
        self.manager.unread_notification_count().await
    }

    /// Mark a notification as read.
    pub async fn mark_notification_read(&self, id: u64) -> bool {
        self.manager.mark_notification_read(id).await
    }
}

impl WaypointBuilder {
    /// Build the Waypoint client and record its startup telemetry.
    pub async fn build(self) -> Result<Waypoint, Error> {
        let config = self.build_config()?;

        let kv: Arc<dyn KeyValueStore> = self
            .key_value_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let secure: Arc<dyn SecureStore> = self
            .secure_store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let context = Arc::new(SessionContext::new(secure));
        context.set_user_agent(Some(user_agent_for(&config)));

        let transport: Arc<dyn Transport> =
            Arc::new(HttpTransport::new(&config, context.clone())?);
        let store = EventStore::new(kv.clone());
        let dispatcher = Arc::new(EventDispatcher::new(
            transport.clone(),
            store,
            kv,
            context.clone(),
            config.flush_leeway(),
        ));

        dispatcher.record_startup_events().await?;

        let manager = Arc::new(SessionManager::new(
            config.clone(),
            transport,
            context,
            dispatcher.clone(),
            self.delegate,
            self.presenter,
        ));

        Ok(Waypoint {
            config,
            dispatcher,
            manager,
        })
    }
}

fn user_agent_for(config: &Config) -> String {
    let details = config.app_details();
    if details.user_agent != "unknown" {
        return details.user_agent.clone();
    }
    format!(
        "waypoint-sdk/{} ({})",
        env!("CARGO_PKG_VERSION"),
        details.bundle
    )
}
