//! Event, payload and wire types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A deep-link payload delivered by the backend: a free-form JSON object.
pub type Payload = serde_json::Map<String, Value>;

/// Kinds of telemetry events reported by the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AppOpen,
    View,
    Open,
    Install,
    Reinstall,
    TimeSpent,
    Reactivation,
}

/// A telemetry event pending delivery.
///
/// The creation timestamp is the identity key: the store never holds two
/// events with the same `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_time: Option<i64>,
}

impl Event {
    /// Create an event of the given kind stamped at `created_at`.
    pub fn new(kind: EventKind, created_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            created_at,
            link: None,
            engagement_time: None,
        }
    }

    /// The body sent to the backend for this event.
    pub(crate) fn to_wire(&self) -> Value {
        json!({
            "event": self.kind,
            "link": self.link,
            "engagement_time": self.engagement_time,
            "created_at": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

/// Identity of the host application, sent with every handshake and payload
/// request.
#[derive(Debug, Clone, Serialize)]
pub struct AppDetails {
    pub version: String,
    pub build: String,
    pub bundle: String,
    pub device: String,
    pub device_id: String,
    pub user_agent: String,
}

impl Default for AppDetails {
    fn default() -> Self {
        let unknown = || "unknown".to_string();
        Self {
            version: unknown(),
            build: unknown(),
            bundle: unknown(),
            device: unknown(),
            device_id: unknown(),
            user_agent: unknown(),
        }
    }
}

/// Parameters for generating a link.
#[derive(Debug, Clone, Default)]
pub struct LinkRequest {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub image_url: Option<String>,
    pub data: Option<Value>,
    pub tags: Option<Vec<String>>,
}

/// An in-app notification, as delivered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub auto_display: bool,
    #[serde(default)]
    pub access_url: Option<String>,
    pub read: bool,
}

/// A successful authentication handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSuccess {
    #[serde(rename = "waypoint_id")]
    pub session_id: String,
    pub uri_scheme: String,
    #[serde(default, rename = "sdk_identifier")]
    pub identifier: Option<String>,
    #[serde(default, rename = "sdk_attributes")]
    pub attributes: Option<Payload>,
}

/// Payload and suggested link returned for a device or a device+URL pair.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceData {
    #[serde(default, rename = "data")]
    pub payload: Option<Payload>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkResponse {
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnreadCountResponse {
    #[serde(default)]
    pub count: Option<u64>,
}
