//! Client configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::manager::{NotificationPresenter, WaypointDelegate};
use crate::storage::{KeyValueStore, SecureStore};
use crate::types::AppDetails;

/// Default API host.
pub const DEFAULT_API_HOST: &str = "https://sdk.waypoint.link/api/v1/sdk";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default leeway before the first batch of queued events is sent, so a
/// burst of startup activity goes out as one flush cycle.
pub const DEFAULT_FLUSH_LEEWAY: Duration = Duration::from_secs(30);

/// Platform tag sent with every request.
pub const DEFAULT_PLATFORM: &str = "rust";

/// Waypoint client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) api_key: String,
    pub(crate) api_host: String,
    pub(crate) timeout: Duration,
    pub(crate) flush_leeway: Duration,
    pub(crate) test_environment: bool,
    pub(crate) platform: String,
    pub(crate) uri_scheme: Option<String>,
    pub(crate) app_details: AppDetails,
}

impl Config {
    /// Get the API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the API host.
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Get the request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the first-batch flush leeway.
    pub fn flush_leeway(&self) -> Duration {
        self.flush_leeway
    }

    /// Whether requests target the test environment.
    pub fn test_environment(&self) -> bool {
        self.test_environment
    }

    /// Get the URI scheme the host declared for deep linking.
    pub fn uri_scheme(&self) -> Option<&str> {
        self.uri_scheme.as_deref()
    }

    /// Get the host application details.
    pub fn app_details(&self) -> &AppDetails {
        &self.app_details
    }

    /// The key sent on the wire; the test environment uses a prefixed key.
    pub(crate) fn access_key(&self) -> String {
        if self.test_environment {
            format!("test_{}", self.api_key)
        } else {
            self.api_key.clone()
        }
    }

    /// Deep linking requires the host to have declared a URI scheme.
    pub(crate) fn has_link_capability(&self) -> bool {
        self.uri_scheme.is_some()
    }
}

/// Builder for the Waypoint client.
pub struct WaypointBuilder {
    api_key: String,
    api_host: Option<String>,
    timeout: Option<Duration>,
    flush_leeway: Option<Duration>,
    test_environment: bool,
    platform: Option<String>,
    uri_scheme: Option<String>,
    app_details: Option<AppDetails>,
    pub(crate) delegate: Option<Arc<dyn WaypointDelegate>>,
    pub(crate) presenter: Option<Arc<dyn NotificationPresenter>>,
    pub(crate) key_value_store: Option<Arc<dyn KeyValueStore>>,
    pub(crate) secure_store: Option<Arc<dyn SecureStore>>,
}

impl WaypointBuilder {
    /// Create a new builder with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_host: None,
            timeout: None,
            flush_leeway: None,
            test_environment: false,
            platform: None,
            uri_scheme: None,
            app_details: None,
            delegate: None,
            presenter: None,
            key_value_store: None,
            secure_store: None,
        }
    }

    /// Set the API host.
    pub fn api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the leeway before the first batch of queued events is sent.
    pub fn flush_leeway(mut self, leeway: Duration) -> Self {
        self.flush_leeway = Some(leeway);
        self
    }

    /// Target the test environment instead of production.
    pub fn test_environment(mut self, enabled: bool) -> Self {
        self.test_environment = enabled;
        self
    }

    /// Override the platform tag sent with every request.
    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Declare the URI scheme the host registered for deep linking.
    ///
    /// Authentication fails fast without one, since deep links could never
    /// be routed back to the app.
    pub fn uri_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.uri_scheme = Some(scheme.into());
        self
    }

    /// Set the host application details.
    pub fn app_details(mut self, details: AppDetails) -> Self {
        self.app_details = Some(details);
        self
    }

    /// Set the delegate notified of every deep-link payload.
    pub fn delegate(mut self, delegate: Arc<dyn WaypointDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Set the presenter used for auto-display notifications.
    pub fn presenter(mut self, presenter: Arc<dyn NotificationPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    /// Supply durable key-value storage (defaults to in-memory).
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.key_value_store = Some(store);
        self
    }

    /// Supply secure storage for the session id (defaults to in-memory).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Build the configuration.
    pub(crate) fn build_config(&self) -> Result<Config, crate::Error> {
        if self.api_key.is_empty() {
            return Err(crate::Error::Config("api_key cannot be empty".into()));
        }

        Ok(Config {
            api_key: self.api_key.clone(),
            api_host: self
                .api_host
                .clone()
                .unwrap_or_else(|| DEFAULT_API_HOST.into()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            flush_leeway: self.flush_leeway.unwrap_or(DEFAULT_FLUSH_LEEWAY),
            test_environment: self.test_environment,
            platform: self
                .platform
                .clone()
                .unwrap_or_else(|| DEFAULT_PLATFORM.into()),
            uri_scheme: self.uri_scheme.clone(),
            app_details: self.app_details.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = WaypointBuilder::new("wp_key").build_config().unwrap();

        assert_eq!(config.api_key(), "wp_key");
        assert_eq!(config.api_host(), DEFAULT_API_HOST);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.flush_leeway(), DEFAULT_FLUSH_LEEWAY);
        assert!(!config.test_environment());
        assert_eq!(config.uri_scheme(), None);
        assert!(!config.has_link_capability());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = WaypointBuilder::new("wp_key")
            .api_host("https://custom.example.com")
            .timeout(Duration::from_secs(30))
            .flush_leeway(Duration::from_secs(5))
            .uri_scheme("myapp://")
            .build_config()
            .unwrap();

        assert_eq!(config.api_host(), "https://custom.example.com");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.flush_leeway(), Duration::from_secs(5));
        assert_eq!(config.uri_scheme(), Some("myapp://"));
        assert!(config.has_link_capability());
    }

    #[test]
    fn test_builder_empty_api_key_fails() {
        let result = WaypointBuilder::new("").build_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_test_environment_prefixes_access_key() {
        let config = WaypointBuilder::new("wp_key")
            .test_environment(true)
            .build_config()
            .unwrap();

        assert_eq!(config.access_key(), "test_wp_key");

        let production = WaypointBuilder::new("wp_key").build_config().unwrap();
        assert_eq!(production.access_key(), "wp_key");
    }
}
