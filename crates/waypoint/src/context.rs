//! Per-session identity and state.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::storage::{keys, SecureStore};
use crate::types::Payload;

/// Identity and state for the current session.
///
/// Owned by the session manager and shared with the transport; the session
/// id is durable (secure storage), everything else lives for the process.
pub struct SessionContext {
    secure: Arc<dyn SecureStore>,
    state: RwLock<ContextState>,
}

#[derive(Default)]
struct ContextState {
    identifier: Option<String>,
    attributes: Option<Payload>,
    push_token: Option<String>,
    user_agent: Option<String>,
}

impl SessionContext {
    pub fn new(secure: Arc<dyn SecureStore>) -> Self {
        Self {
            secure,
            state: RwLock::new(ContextState::default()),
        }
    }

    /// The durable session id, if one was issued by a previous handshake.
    pub fn session_id(&self) -> Option<String> {
        match self.secure.get_value(keys::SESSION_ID) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "failed to read session id");
                None
            }
        }
    }

    pub fn set_session_id(&self, session_id: &str) {
        if let Err(err) = self.secure.set_value(keys::SESSION_ID, session_id) {
            warn!(error = %err, "failed to persist session id");
        }
    }

    pub fn identifier(&self) -> Option<String> {
        self.state.read().identifier.clone()
    }

    pub fn set_identifier(&self, identifier: Option<String>) {
        self.state.write().identifier = identifier;
    }

    pub fn attributes(&self) -> Option<Payload> {
        self.state.read().attributes.clone()
    }

    pub fn set_attributes(&self, attributes: Option<Payload>) {
        self.state.write().attributes = attributes;
    }

    pub fn push_token(&self) -> Option<String> {
        self.state.read().push_token.clone()
    }

    pub fn set_push_token(&self, push_token: Option<String>) {
        self.state.write().push_token = push_token;
    }

    pub fn user_agent(&self) -> Option<String> {
        self.state.read().user_agent.clone()
    }

    pub fn set_user_agent(&self, user_agent: Option<String>) {
        self.state.write().user_agent = user_agent;
    }

    /// One consistent view of the attribute fields, for a sync request.
    pub fn attribute_snapshot(&self) -> (Option<String>, Option<Payload>, Option<String>) {
        let state = self.state.read();
        (
            state.identifier.clone(),
            state.attributes.clone(),
            state.push_token.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_session_id_round_trip() {
        let context = SessionContext::new(Arc::new(MemoryStore::new()));

        assert_eq!(context.session_id(), None);
        context.set_session_id("wp_123");
        assert_eq!(context.session_id().as_deref(), Some("wp_123"));
    }

    #[test]
    fn test_attribute_snapshot_is_consistent() {
        let context = SessionContext::new(Arc::new(MemoryStore::new()));
        context.set_identifier(Some("user-1".into()));

        let mut attributes = Payload::new();
        attributes.insert("plan".into(), json!("pro"));
        context.set_attributes(Some(attributes));

        let (identifier, attributes, push_token) = context.attribute_snapshot();
        assert_eq!(identifier.as_deref(), Some("user-1"));
        assert_eq!(attributes.unwrap()["plan"], "pro");
        assert_eq!(push_token, None);
    }
}
