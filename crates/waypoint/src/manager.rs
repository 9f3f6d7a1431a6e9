//! Authentication-gated session management and payload fanout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::context::SessionContext;
use crate::dispatcher::EventDispatcher;
use crate::transport::Transport;
use crate::types::{LinkRequest, Notification, Payload};

/// Receives every deep-link payload as it arrives.
pub trait WaypointDelegate: Send + Sync {
    fn received_payload_from_deeplink(&self, payload: &Payload);
}

/// Presents auto-display notifications to the user.
///
/// `present` must resolve only once the user has dismissed the
/// notification; the next one is not shown before that.
#[async_trait]
pub trait NotificationPresenter: Send + Sync {
    async fn present(&self, notification: &Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Owns the authentication handshake and gates all outbound activity on it.
///
/// Anything arriving early is buffered (one pending URL slot, a dirty flag
/// for attributes) and replayed exactly once authentication succeeds.
pub struct SessionManager {
    config: Config,
    transport: Arc<dyn Transport>,
    context: Arc<SessionContext>,
    dispatcher: Arc<EventDispatcher>,
    delegate: Option<Arc<dyn WaypointDelegate>>,
    presenter: Option<Arc<dyn NotificationPresenter>>,
    state: parking_lot::Mutex<AuthState>,
    enabled: AtomicBool,
    needs_attribute_sync: AtomicBool,
    fanout: AsyncMutex<FanoutState>,
    display_gate: Arc<AsyncMutex<()>>,
}

#[derive(Default)]
struct FanoutState {
    pending_url: Option<String>,
    launch_handled: bool,
    received_payloads: Vec<Payload>,
    last_payload_waiters: Vec<oneshot::Sender<Option<Payload>>>,
    all_payloads_waiters: Vec<oneshot::Sender<Vec<Payload>>>,
}

impl SessionManager {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        context: Arc<SessionContext>,
        dispatcher: Arc<EventDispatcher>,
        delegate: Option<Arc<dyn WaypointDelegate>>,
        presenter: Option<Arc<dyn NotificationPresenter>>,
    ) -> Self {
        Self {
            config,
            transport,
            context,
            dispatcher,
            delegate,
            presenter,
            state: parking_lot::Mutex::new(AuthState::Unauthenticated),
            enabled: AtomicBool::new(true),
            needs_attribute_sync: AtomicBool::new(false),
            fanout: AsyncMutex::new(FanoutState::default()),
            display_gate: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "SDK enabled state changed");
    }

    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_authenticated(&self) -> bool {
        *self.state.lock() == AuthState::Authenticated
    }

    /// Run the authentication handshake.
    ///
    /// Returns `false` without touching the network when the host never
    /// declared a URI scheme, and on any handshake failure; no retry is
    /// scheduled either way. On success, everything buffered while
    /// unauthenticated is replayed.
    pub async fn authenticate(&self) -> bool {
        if !self.config.has_link_capability() {
            error!("no URI scheme declared; deep linking cannot work");
            return false;
        }

        *self.state.lock() = AuthState::Authenticating;

        match self.transport.authenticate(self.config.app_details()).await {
            Ok(auth) => {
                self.context.set_session_id(&auth.session_id);

                // Local attribute mutations still waiting on a sync win
                // over the values the backend pushed down.
                if !self.needs_attribute_sync.load(Ordering::SeqCst) {
                    self.context.set_identifier(auth.identifier.clone());
                    self.context.set_attributes(auth.attributes.clone());
                }

                *self.state.lock() = AuthState::Authenticated;
                info!("authenticated");

                self.check_uri_scheme(&auth.uri_scheme);
                self.replay_pending_url().await;
                self.refresh_device_data().await;
                if self.needs_attribute_sync.load(Ordering::SeqCst) {
                    self.sync_attributes_now().await;
                }
                self.drain_waiters_if_ready().await;

                true
            }
            Err(err) => {
                warn!(error = %err, "authentication failed");
                *self.state.lock() = AuthState::Unauthenticated;
                false
            }
        }
    }

    fn check_uri_scheme(&self, backend_scheme: &str) {
        let declared = self.config.uri_scheme().unwrap_or_default();
        fn normalize(scheme: &str) -> &str {
            scheme.trim_end_matches("://")
        }
        if normalize(declared) == normalize(backend_scheme) {
            debug!("URI scheme properly configured");
        } else {
            error!(
                declared,
                backend = backend_scheme,
                "URI scheme mismatch between the app and the dashboard; deep links will not route"
            );
        }
    }

    /// Route an inbound deep-link/universal-link URL.
    ///
    /// Before authentication only the first URL is kept, and it is processed
    /// once the handshake succeeds; afterwards URLs are processed directly.
    pub async fn handle_url(&self, url: &str) {
        if !self.enabled() {
            return;
        }

        if !self.is_authenticated() {
            let mut fanout = self.fanout.lock().await;
            if fanout.pending_url.is_none() {
                fanout.pending_url = Some(url.to_string());
            }
            return;
        }

        self.process_url(url).await;
    }

    async fn replay_pending_url(&self) {
        let pending = self.fanout.lock().await.pending_url.take();
        if let Some(url) = pending {
            self.process_url(&url).await;
        }
    }

    async fn process_url(&self, url: &str) {
        self.dispatcher
            .set_link_for_future_actions(Some(url.to_string()))
            .await;

        match self
            .transport
            .payload_for_device_and_url(self.config.app_details(), url)
            .await
        {
            Ok(data) => {
                if data.link.is_some() {
                    self.dispatcher
                        .set_link_for_future_actions(data.link.clone())
                        .await;
                }
                self.accept_payload(data.payload).await;
            }
            Err(err) => warn!(error = %err, url, "failed to fetch payload for URL"),
        }
    }

    /// Fetch the device payload and kick off auto-display notifications.
    pub async fn refresh_device_data(&self) {
        if !self.enabled() || !self.is_authenticated() {
            return;
        }

        match self
            .transport
            .payload_for_device(self.config.app_details())
            .await
        {
            Ok(data) => {
                if data.link.is_some() {
                    self.dispatcher
                        .set_link_for_future_actions(data.link.clone())
                        .await;
                }
                self.accept_payload(data.payload).await;
                self.auto_display_notifications().await;
            }
            Err(err) => warn!(error = %err, "failed to fetch device data"),
        }
    }

    async fn accept_payload(&self, payload: Option<Payload>) {
        {
            let mut fanout = self.fanout.lock().await;
            if let Some(payload) = payload.clone() {
                fanout.received_payloads.push(payload);
            }
            self.drain_locked(&mut fanout);
        }

        if let (Some(delegate), Some(payload)) = (self.delegate.as_ref(), payload) {
            delegate.received_payload_from_deeplink(&payload);
        }
    }

    // ============================================
    // PAYLOAD FANOUT
    // ============================================

    /// Resolve with the most recent payload once both the handshake and the
    /// launch latch are settled. One-shot: each call is answered once.
    pub async fn last_payload(&self) -> Option<Payload> {
        let (tx, rx) = oneshot::channel();
        {
            let mut fanout = self.fanout.lock().await;
            fanout.last_payload_waiters.push(tx);
            self.drain_locked(&mut fanout);
        }
        rx.await.unwrap_or(None)
    }

    /// Resolve with every payload received since process start, in arrival
    /// order, under the same gating as [`Self::last_payload`].
    pub async fn all_payloads_since_startup(&self) -> Vec<Payload> {
        let (tx, rx) = oneshot::channel();
        {
            let mut fanout = self.fanout.lock().await;
            fanout.all_payloads_waiters.push(tx);
            self.drain_locked(&mut fanout);
        }
        rx.await.unwrap_or_default()
    }

    async fn drain_waiters_if_ready(&self) {
        let mut fanout = self.fanout.lock().await;
        self.drain_locked(&mut fanout);
    }

    fn drain_locked(&self, fanout: &mut FanoutState) {
        if !self.is_authenticated() || !fanout.launch_handled {
            return;
        }

        for waiter in fanout.all_payloads_waiters.drain(..) {
            let _ = waiter.send(fanout.received_payloads.clone());
        }

        let last = fanout.received_payloads.last().cloned();
        for waiter in fanout.last_payload_waiters.drain(..) {
            let _ = waiter.send(last.clone());
        }
    }

    // ============================================
    // PLATFORM LAUNCH FORWARDS
    // ============================================

    pub async fn handle_open_url(&self, url: &str) {
        self.handle_url(url).await;
        self.mark_launch_handled().await;
    }

    pub async fn handle_continue_activity(&self, url: &str) {
        self.handle_url(url).await;
        self.mark_launch_handled().await;
    }

    pub async fn handle_scene_connection(&self, urls: Vec<String>) {
        for url in &urls {
            self.handle_url(url).await;
        }
        self.mark_launch_handled().await;
    }

    async fn mark_launch_handled(&self) {
        let mut fanout = self.fanout.lock().await;
        fanout.launch_handled = true;
        self.drain_locked(&mut fanout);
    }

    // ============================================
    // ATTRIBUTES
    // ============================================

    pub async fn set_identifier(&self, identifier: Option<String>) {
        self.context.set_identifier(identifier);
        self.sync_attributes_now().await;
    }

    pub async fn set_attributes(&self, attributes: Option<Payload>) {
        self.context.set_attributes(attributes);
        self.sync_attributes_now().await;
    }

    pub async fn set_push_token(&self, push_token: Option<String>) {
        self.context.set_push_token(push_token);
        self.sync_attributes_now().await;
    }

    async fn sync_attributes_now(&self) {
        if !self.is_authenticated() {
            self.needs_attribute_sync.store(true, Ordering::SeqCst);
        }

        let (identifier, attributes, push_token) = self.context.attribute_snapshot();
        match self
            .transport
            .sync_attributes(identifier, attributes, push_token)
            .await
        {
            Ok(true) => self.needs_attribute_sync.store(false, Ordering::SeqCst),
            Ok(false) => debug!("attribute sync not acknowledged"),
            Err(err) => debug!(error = %err, "attribute sync failed"),
        }
    }

    // ============================================
    // LINKS & NOTIFICATIONS
    // ============================================

    pub async fn generate_link(&self, request: &LinkRequest) -> Option<String> {
        if !self.enabled() {
            error!("the SDK is disabled; links cannot be generated");
            return None;
        }
        if !self.is_authenticated() {
            info!("not authenticated yet; links cannot be generated");
            return None;
        }

        match self.transport.create_link(request).await {
            Ok(link) => link,
            Err(err) => {
                warn!(error = %err, "link generation failed");
                None
            }
        }
    }

    pub async fn notifications(&self, page: u32) -> Option<Vec<Notification>> {
        match self.transport.notifications(page).await {
            Ok(notifications) => Some(notifications),
            Err(err) => {
                warn!(error = %err, page, "failed to fetch notifications");
                None
            }
        }
    }

    pub async fn unread_notification_count(&self) -> Option<u64> {
        match self.transport.unread_notification_count().await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "failed to fetch unread count");
                None
            }
        }
    }

    pub async fn mark_notification_read(&self, id: u64) -> bool {
        match self.transport.mark_notification_read(id).await {
            Ok(acknowledged) => acknowledged,
            Err(err) => {
                warn!(error = %err, id, "failed to mark notification read");
                false
            }
        }
    }

    async fn auto_display_notifications(&self) {
        let Some(presenter) = self.presenter.clone() else {
            return;
        };

        match self.transport.auto_display_notifications().await {
            Ok(notifications) if !notifications.is_empty() => {
                let gate = Arc::clone(&self.display_gate);
                tokio::spawn(async move {
                    // One at a time: the next notification waits for the
                    // previous dismissal, across fetch bursts too.
                    let _serial = gate.lock().await;
                    for notification in &notifications {
                        presenter.present(notification).await;
                    }
                });
            }
            Ok(_) => {}
            Err(err) => debug!(error = %err, "no auto-display notifications"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaypointBuilder;
    use crate::storage::MemoryStore;
    use crate::store::EventStore;
    use crate::transport::MockTransport;
    use crate::types::{AuthSuccess, DeviceData};
    use crate::Error;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn payload(key: &str, value: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert(key.into(), json!(value));
        payload
    }

    fn auth_success() -> AuthSuccess {
        AuthSuccess {
            session_id: "wp_1".into(),
            uri_scheme: "myapp://".into(),
            identifier: None,
            attributes: None,
        }
    }

    fn manager_with(
        transport: MockTransport,
        delegate: Option<Arc<dyn WaypointDelegate>>,
        presenter: Option<Arc<dyn NotificationPresenter>>,
    ) -> Arc<SessionManager> {
        let config = WaypointBuilder::new("wp_key")
            .uri_scheme("myapp://")
            .build_config()
            .unwrap();
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let kv = Arc::new(MemoryStore::new());
        let context = Arc::new(SessionContext::new(Arc::new(MemoryStore::new())));
        let dispatcher = Arc::new(EventDispatcher::new(
            transport.clone(),
            EventStore::new(kv.clone()),
            kv,
            context.clone(),
            Duration::from_secs(30),
        ));
        Arc::new(SessionManager::new(
            config, transport, context, dispatcher, delegate, presenter,
        ))
    }

    #[tokio::test]
    async fn test_authenticate_without_uri_scheme_fails_fast() {
        let mut transport = MockTransport::new();
        transport.expect_authenticate().times(0);
        let config = WaypointBuilder::new("wp_key").build_config().unwrap();

        let transport: Arc<dyn Transport> = Arc::new(transport);
        let kv = Arc::new(MemoryStore::new());
        let context = Arc::new(SessionContext::new(Arc::new(MemoryStore::new())));
        let dispatcher = Arc::new(EventDispatcher::new(
            transport.clone(),
            EventStore::new(kv.clone()),
            kv,
            context.clone(),
            Duration::from_secs(30),
        ));
        let manager = SessionManager::new(config, transport, context, dispatcher, None, None);

        assert!(!manager.authenticate().await);
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_authenticate_failure_stays_unauthenticated() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Err(Error::Api { status: 401 }));
        transport.expect_payload_for_device().times(0);
        let manager = manager_with(transport, None, None);

        assert!(!manager.authenticate().await);
        assert!(!manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_authenticate_persists_session_id() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);
        assert!(manager.is_authenticated());
        assert_eq!(manager.context().session_id().as_deref(), Some("wp_1"));
    }

    #[tokio::test]
    async fn test_fanout_waits_for_auth_and_launch_latch() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport.expect_payload_for_device().returning(|_| {
            Ok(DeviceData {
                payload: Some(payload("campaign", "spring")),
                link: None,
            })
        });
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);

        let waiter = tokio::spawn({
            let manager = manager.clone();
            async move { manager.last_payload().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "must wait for the launch latch");

        manager.handle_scene_connection(Vec::new()).await;

        let delivered = waiter.await.unwrap().expect("payload delivered");
        assert_eq!(delivered["campaign"], "spring");
    }

    #[tokio::test]
    async fn test_registration_after_gating_drains_immediately() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport.expect_payload_for_device().returning(|_| {
            Ok(DeviceData {
                payload: Some(payload("campaign", "spring")),
                link: None,
            })
        });
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);
        manager.handle_scene_connection(Vec::new()).await;

        let last = manager.last_payload().await.expect("payload");
        assert_eq!(last["campaign"], "spring");

        let all = manager.all_payloads_since_startup().await;
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_last_payload_resolves_none_when_nothing_received() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);
        manager.handle_scene_connection(Vec::new()).await;

        assert_eq!(manager.last_payload().await, None);
        assert!(manager.all_payloads_since_startup().await.is_empty());
    }

    #[tokio::test]
    async fn test_first_pre_auth_url_wins() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        transport
            .expect_payload_for_device_and_url()
            .withf(|_, url| url == "myapp://first")
            .times(1)
            .returning(|_, _| {
                Ok(DeviceData {
                    payload: Some(payload("origin", "first")),
                    link: None,
                })
            });
        let manager = manager_with(transport, None, None);

        manager.handle_url("myapp://first").await;
        manager.handle_url("myapp://second").await;

        assert!(manager.authenticate().await);
        manager.handle_scene_connection(Vec::new()).await;

        let all = manager.all_payloads_since_startup().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["origin"], "first");
    }

    #[tokio::test]
    async fn test_post_auth_urls_bypass_the_pending_slot() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        transport
            .expect_payload_for_device_and_url()
            .times(2)
            .returning(|_, url| {
                Ok(DeviceData {
                    payload: Some(payload("url", url)),
                    link: None,
                })
            });
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);
        manager.handle_open_url("myapp://a").await;
        manager.handle_open_url("myapp://b").await;

        let all = manager.all_payloads_since_startup().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["url"], "myapp://a");
        assert_eq!(all[1]["url"], "myapp://b");
    }

    #[tokio::test]
    async fn test_pre_auth_attribute_mutation_wins_over_backend_values() {
        let mut transport = MockTransport::new();
        transport.expect_authenticate().returning(|_| {
            Ok(AuthSuccess {
                identifier: Some("backend-user".into()),
                ..auth_success()
            })
        });
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        // The pre-auth attempt is rejected; the post-auth one succeeds.
        transport
            .expect_sync_attributes()
            .returning(|identifier, _, _| Ok(identifier.as_deref() == Some("local-user")));
        let manager = manager_with(transport, None, None);

        manager.set_identifier(Some("local-user".into())).await;
        assert!(manager.needs_attribute_sync.load(Ordering::SeqCst));

        assert!(manager.authenticate().await);

        assert_eq!(
            manager.context().identifier().as_deref(),
            Some("local-user")
        );
        assert!(!manager.needs_attribute_sync.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_auth_adopts_backend_attributes_when_no_local_changes() {
        let mut transport = MockTransport::new();
        transport.expect_authenticate().returning(|_| {
            Ok(AuthSuccess {
                identifier: Some("backend-user".into()),
                attributes: Some(payload("plan", "pro")),
                ..auth_success()
            })
        });
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        transport.expect_sync_attributes().times(0);
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);

        assert_eq!(
            manager.context().identifier().as_deref(),
            Some("backend-user")
        );
        assert_eq!(manager.context().attributes().unwrap()["plan"], "pro");
    }

    struct RecordingDelegate {
        payloads: parking_lot::Mutex<Vec<Payload>>,
    }

    impl WaypointDelegate for RecordingDelegate {
        fn received_payload_from_deeplink(&self, payload: &Payload) {
            self.payloads.lock().push(payload.clone());
        }
    }

    #[tokio::test]
    async fn test_delegate_receives_each_payload() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport.expect_payload_for_device().returning(|_| {
            Ok(DeviceData {
                payload: Some(payload("campaign", "spring")),
                link: None,
            })
        });
        let delegate = Arc::new(RecordingDelegate {
            payloads: parking_lot::Mutex::new(Vec::new()),
        });
        let manager = manager_with(transport, Some(delegate.clone()), None);

        assert!(manager.authenticate().await);

        let received = delegate.payloads.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["campaign"], "spring");
    }

    struct OverlapProbe {
        active: AtomicUsize,
        max_active: AtomicUsize,
        shown: AtomicUsize,
    }

    #[async_trait]
    impl NotificationPresenter for OverlapProbe {
        async fn present(&self, _notification: &Notification) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.shown.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn auto_notification(id: u64) -> Notification {
        Notification {
            id,
            title: format!("notification {id}"),
            subtitle: None,
            updated_at: Utc::now(),
            auto_display: true,
            access_url: None,
            read: false,
        }
    }

    #[tokio::test]
    async fn test_auto_display_is_strictly_sequential() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        transport
            .expect_auto_display_notifications()
            .returning(|| Ok(vec![auto_notification(1), auto_notification(2)]));
        let probe = Arc::new(OverlapProbe {
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            shown: AtomicUsize::new(0),
        });
        let manager = manager_with(transport, None, Some(probe.clone()));

        assert!(manager.authenticate().await);
        // A second fetch burst must not overlap the first queue.
        manager.refresh_device_data().await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(probe.shown.load(Ordering::SeqCst), 4);
        assert_eq!(probe.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_blocks_urls_and_link_generation() {
        let mut transport = MockTransport::new();
        transport
            .expect_authenticate()
            .returning(|_| Ok(auth_success()));
        transport
            .expect_payload_for_device()
            .returning(|_| Ok(DeviceData::default()));
        transport.expect_payload_for_device_and_url().times(0);
        transport.expect_create_link().times(0);
        let manager = manager_with(transport, None, None);

        assert!(manager.authenticate().await);
        manager.set_enabled(false);

        manager.handle_url("myapp://promo").await;
        assert_eq!(manager.generate_link(&LinkRequest::default()).await, None);
    }

    #[tokio::test]
    async fn test_generate_link_requires_authentication() {
        let mut transport = MockTransport::new();
        transport.expect_create_link().times(0);
        let manager = manager_with(transport, None, None);

        assert_eq!(manager.generate_link(&LinkRequest::default()).await, None);
    }
}
