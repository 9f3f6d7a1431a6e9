//! Waypoint deep-linking and attribution SDK for Rust.
//!
//! The SDK identifies the host application to the Waypoint backend,
//! resolves deferred deep-link payloads, and reports usage telemetry over a
//! durable, restart-surviving event queue. URL handling and payload fetches
//! are gated behind the authentication handshake; anything arriving early
//! is buffered and replayed once the handshake succeeds.
//!
//! # Example
//!
//! ```rust,ignore
//! use waypoint::{AppDetails, Waypoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), waypoint::Error> {
//!     let client = Waypoint::builder("wp_xxx")
//!         .uri_scheme("myapp://")
//!         .app_details(AppDetails {
//!             bundle: "com.example.app".into(),
//!             ..AppDetails::default()
//!         })
//!         .build()
//!         .await?;
//!
//!     client.authenticate().await;
//!
//!     // Forward platform launch information so payload getters can fire.
//!     client.handle_open_url("myapp://promo/spring").await;
//!
//!     if let Some(payload) = client.last_payload().await {
//!         println!("deep link payload: {payload:?}");
//!     }
//!
//!     client.application_will_resign_active();
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod context;
mod dispatcher;
mod error;
mod manager;
pub mod storage;
mod store;
mod transport;
mod types;

pub use client::Waypoint;
pub use config::{Config, WaypointBuilder};
pub use error::Error;
pub use manager::{NotificationPresenter, WaypointDelegate};
pub use types::{
    AppDetails, AuthSuccess, DeviceData, Event, EventKind, LinkRequest, Notification, Payload,
};
