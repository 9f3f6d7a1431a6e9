//! Error types for the Waypoint SDK.

/// Errors that can occur when using the Waypoint SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected a request.
    #[error("API request failed with status {status}")]
    Api {
        /// HTTP status code returned by the backend.
        status: u16,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A storage collaborator failed to read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The durable event array exists but does not decode.
    ///
    /// Distinct from an empty store so callers can tell "never wrote
    /// anything" apart from "failed to read a write that happened".
    #[error("stored event data is corrupt: {0}")]
    CorruptStore(#[source] serde_json::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
