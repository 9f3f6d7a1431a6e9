//! Backend transport: one authenticated request/response exchange per call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::context::SessionContext;
use crate::types::{
    AppDetails, AuthSuccess, DeviceData, Event, LinkRequest, LinkResponse, Notification,
    NotificationsResponse, Payload, UnreadCountResponse,
};
use crate::Error;

const AUTHENTICATE: &str = "/authenticate";
const DATA_FOR_DEVICE: &str = "/data_for_device";
const DATA_FOR_DEVICE_AND_URL: &str = "/data_for_device_and_url";
const CREATE_LINK: &str = "/create_link";
const EVENT: &str = "/event";
const ATTRIBUTES: &str = "/visitor_attributes";
const MESSAGES: &str = "/messages_for_device";
const UNREAD_COUNT: &str = "/number_of_unread_messages";
const MARK_READ: &str = "/mark_notification_as_read";
const AUTO_DISPLAY: &str = "/notifications_to_display_automatically";

const HEADER_API_KEY: &str = "PROJECT-KEY";
const HEADER_IDENTIFIER: &str = "IDENTIFIER";
const HEADER_PLATFORM: &str = "PLATFORM";
const HEADER_SESSION: &str = "WAYPOINT-SESSION";

/// The backend operations this SDK consumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the authentication handshake.
    async fn authenticate(&self, details: &AppDetails) -> Result<AuthSuccess, Error>;

    /// Fetch the payload for this device.
    async fn payload_for_device(&self, details: &AppDetails) -> Result<DeviceData, Error>;

    /// Fetch the payload for this device scoped to a URL.
    async fn payload_for_device_and_url(
        &self,
        details: &AppDetails,
        url: &str,
    ) -> Result<DeviceData, Error>;

    /// Deliver one event; `Ok(true)` is the only acknowledgment of success.
    async fn send_event(&self, event: &Event) -> Result<bool, Error>;

    /// Push the current visitor attributes.
    async fn sync_attributes(
        &self,
        identifier: Option<String>,
        attributes: Option<Payload>,
        push_token: Option<String>,
    ) -> Result<bool, Error>;

    /// Generate a link.
    async fn create_link(&self, request: &LinkRequest) -> Result<Option<String>, Error>;

    /// List notifications for the given page.
    async fn notifications(&self, page: u32) -> Result<Vec<Notification>, Error>;

    /// Number of unread notifications.
    async fn unread_notification_count(&self) -> Result<Option<u64>, Error>;

    /// Mark one notification as read.
    async fn mark_notification_read(&self, id: u64) -> Result<bool, Error>;

    /// Notifications flagged for automatic display.
    async fn auto_display_notifications(&self) -> Result<Vec<Notification>, Error>;
}

/// HTTP transport for the Waypoint backend.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    access_key: String,
    bundle: String,
    platform: String,
    context: Arc<SessionContext>,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: &Config, context: Arc<SessionContext>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_host().to_string(),
            access_key: config.access_key(),
            bundle: config.app_details().bundle.clone(),
            platform: config.platform.clone(),
            context,
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(HEADER_API_KEY, &self.access_key)
            .header(HEADER_IDENTIFIER, &self.bundle)
            .header(HEADER_PLATFORM, &self.platform)
            .header("Content-Type", "application/json");

        if let Some(user_agent) = self.context.user_agent() {
            builder = builder.header("User-Agent", user_agent);
        }
        if let Some(session_id) = self.context.session_id() {
            builder = builder.header(HEADER_SESSION, session_id);
        }

        builder
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, Error> {
        let response = self.request(path).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            warn!(path, status = %status, "API request failed");
            return Err(Error::Api {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    async fn post_ack(&self, path: &str, body: &Value) -> Result<bool, Error> {
        let response = self.request(path).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            debug!(path, status = %status, "request not acknowledged");
        }

        Ok(status.is_success())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn authenticate(&self, details: &AppDetails) -> Result<AuthSuccess, Error> {
        debug!("authenticating");
        let body = serde_json::to_value(details)?;
        let auth: AuthSuccess = self.post_json(AUTHENTICATE, &body).await?;
        debug!("authenticated");
        Ok(auth)
    }

    async fn payload_for_device(&self, details: &AppDetails) -> Result<DeviceData, Error> {
        debug!("fetching payload for device");
        let body = serde_json::to_value(details)?;
        self.post_json(DATA_FOR_DEVICE, &body).await
    }

    async fn payload_for_device_and_url(
        &self,
        details: &AppDetails,
        url: &str,
    ) -> Result<DeviceData, Error> {
        debug!(url, "fetching payload for device and URL");
        let mut body = serde_json::to_value(details)?;
        body["url"] = json!(url);
        self.post_json(DATA_FOR_DEVICE_AND_URL, &body).await
    }

    async fn send_event(&self, event: &Event) -> Result<bool, Error> {
        debug!(kind = ?event.kind, "sending event");
        self.post_ack(EVENT, &event.to_wire()).await
    }

    async fn sync_attributes(
        &self,
        identifier: Option<String>,
        attributes: Option<Payload>,
        push_token: Option<String>,
    ) -> Result<bool, Error> {
        debug!("syncing visitor attributes");
        let body = json!({
            "sdk_identifier": identifier,
            "sdk_attributes": attributes,
            "sdk_push_token": push_token,
        });
        self.post_ack(ATTRIBUTES, &body).await
    }

    async fn create_link(&self, request: &LinkRequest) -> Result<Option<String>, Error> {
        debug!("generating link");

        // Data and tags travel as JSON-encoded strings.
        let data = request
            .data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let tags = request
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let body = json!({
            "title": request.title,
            "subtitle": request.subtitle,
            "image_url": request.image_url,
            "data": data,
            "tags": tags,
        });

        let response: LinkResponse = self.post_json(CREATE_LINK, &body).await?;
        Ok(response.link)
    }

    async fn notifications(&self, page: u32) -> Result<Vec<Notification>, Error> {
        debug!(page, "fetching notifications");
        let response: NotificationsResponse =
            self.post_json(MESSAGES, &json!({ "page": page })).await?;
        Ok(response.notifications)
    }

    async fn unread_notification_count(&self) -> Result<Option<u64>, Error> {
        let response: UnreadCountResponse = self.post_json(UNREAD_COUNT, &json!({})).await?;
        Ok(response.count)
    }

    async fn mark_notification_read(&self, id: u64) -> Result<bool, Error> {
        self.post_ack(MARK_READ, &json!({ "notification_id": id }))
            .await
    }

    async fn auto_display_notifications(&self) -> Result<Vec<Notification>, Error> {
        debug!("fetching auto-display notifications");
        let response: NotificationsResponse = self.post_json(AUTO_DISPLAY, &json!({})).await?;
        Ok(response.notifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaypointBuilder;
    use crate::storage::MemoryStore;

    #[test]
    fn test_endpoint_construction() {
        let config = WaypointBuilder::new("wp_key")
            .api_host("https://example.com/api/v1/sdk")
            .build_config()
            .unwrap();
        let context = Arc::new(SessionContext::new(Arc::new(MemoryStore::new())));

        let transport = HttpTransport::new(&config, context).unwrap();

        assert_eq!(transport.base_url, "https://example.com/api/v1/sdk");
        assert_eq!(transport.access_key, "wp_key");
        assert_eq!(transport.platform, "rust");
    }
}
