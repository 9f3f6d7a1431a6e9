//! Persistence collaborators: plain key-value storage and secure storage.
//!
//! The SDK owns a handful of durable scalars, the serialized event queue and
//! the session id. Hosts with platform-native storage (a keychain, app
//! preferences) implement [`KeyValueStore`] and [`SecureStore`] themselves;
//! [`MemoryStore`] and [`FileStore`] cover tests and hosts without one.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

use crate::Error;

/// Durable key-value storage for small string values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove(&self, key: &str) -> Result<(), Error>;
}

/// Durable storage for secrets (the session id).
pub trait SecureStore: Send + Sync {
    fn get_value(&self, key: &str) -> Result<Option<String>, Error>;
    fn set_value(&self, key: &str, value: &str) -> Result<(), Error>;
    fn remove_value(&self, key: &str) -> Result<(), Error>;
}

pub(crate) mod keys {
    pub const NUMBER_OF_OPENS: &str = "number_of_opens";
    pub const RESIGN_TIMESTAMP: &str = "resign_timestamp";
    pub const LAST_START_TIMESTAMP: &str = "last_start_timestamp";
    pub const CACHED_EVENTS: &str = "cached_events";
    pub const SESSION_ID: &str = "waypoint_session_id";
}

/// Read a persisted integer scalar; absent or unreadable values read as 0,
/// matching the "never written" semantics callers rely on.
pub(crate) fn read_i64(store: &dyn KeyValueStore, key: &str) -> i64 {
    match store.get(key) {
        Ok(Some(value)) => value.parse().unwrap_or_else(|_| {
            warn!(key, value, "ignoring unparsable stored scalar");
            0
        }),
        Ok(None) => 0,
        Err(err) => {
            warn!(key, error = %err, "failed to read stored scalar");
            0
        }
    }
}

/// Persist an integer scalar, logging instead of propagating failures.
pub(crate) fn write_i64(store: &dyn KeyValueStore, key: &str, value: i64) {
    if let Err(err) = store.set(key, &value.to_string()) {
        warn!(key, value, error = %err, "failed to persist scalar");
    }
}

/// In-memory store; the builder default and the test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.values.lock().remove(key);
        Ok(())
    }
}

impl SecureStore for MemoryStore {
    fn get_value(&self, key: &str) -> Result<Option<String>, Error> {
        KeyValueStore::get(self, key)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), Error> {
        KeyValueStore::set(self, key, value)
    }

    fn remove_value(&self, key: &str) -> Result<(), Error> {
        KeyValueStore::remove(self, key)
    }
}

/// File-backed store: one JSON object per file, rewritten atomically
/// (write-temp-then-rename) on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let values = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| Error::Storage(format!("unreadable store {}: {err}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(Error::Storage(format!(
                    "cannot open store {}: {err}",
                    path.display()
                )))
            }
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<(), Error> {
        let bytes = serde_json::to_vec(values)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)
            .and_then(|()| std::fs::rename(&tmp, &self.path))
            .map_err(|err| Error::Storage(format!("cannot write store {}: {err}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let mut values = self.values.lock();
        values.remove(key);
        self.persist(&values)
    }
}

impl SecureStore for FileStore {
    fn get_value(&self, key: &str) -> Result<Option<String>, Error> {
        KeyValueStore::get(self, key)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), Error> {
        KeyValueStore::set(self, key, value)
    }

    fn remove_value(&self, key: &str) -> Result<(), Error> {
        KeyValueStore::remove(self, key)
    }
}
