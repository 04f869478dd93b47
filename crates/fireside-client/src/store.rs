//! Persistence collaborator.
//!
//! The engine treats storage as a snapshot store: save and load opaque
//! values keyed by a primary or composite key. There are no transactional
//! guarantees beyond "one snapshot is one entry"; a room and its messages
//! are saved together as a single value. Decoding context is always passed
//! explicitly by the caller loading a snapshot, never held globally.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Storage failure, propagated uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store failure: {reason}")]
pub struct StoreError {
    /// Store-defined description of the failure.
    pub reason: String,
}

impl StoreError {
    /// Wrap a store-defined failure description.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Key for a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKey {
    /// A single primary key, e.g. a room id.
    Primary(String),
    /// A composite key, e.g. user id + device id for credentials.
    Composite(Vec<String>),
}

impl StoreKey {
    /// A primary key.
    pub fn primary(key: impl Into<String>) -> Self {
        Self::Primary(key.into())
    }

    /// A composite key from its parts, in order.
    pub fn composite<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self::Composite(parts.into_iter().map(Into::into).collect())
    }
}

/// Snapshot store for engine entities.
///
/// `kind` namespaces entities (`"room"`, `"credentials"`, …); the engine
/// never assumes anything about how implementations lay the data out.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Save (insert or replace) one entity snapshot.
    async fn save(&self, kind: &str, key: StoreKey, value: Value) -> Result<(), StoreError>;

    /// Load one entity snapshot, if present.
    async fn load(&self, kind: &str, key: &StoreKey) -> Result<Option<Value>, StoreError>;

    /// Load every snapshot of a kind.
    async fn load_all(&self, kind: &str) -> Result<Vec<Value>, StoreError>;

    /// Remove one entity snapshot; absent entries are not an error.
    async fn remove(&self, kind: &str, key: &StoreKey) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for std::sync::Arc<S> {
    async fn save(&self, kind: &str, key: StoreKey, value: Value) -> Result<(), StoreError> {
        (**self).save(kind, key, value).await
    }

    async fn load(&self, kind: &str, key: &StoreKey) -> Result<Option<Value>, StoreError> {
        (**self).load(kind, key).await
    }

    async fn load_all(&self, kind: &str) -> Result<Vec<Value>, StoreError> {
        (**self).load_all(kind).await
    }

    async fn remove(&self, kind: &str, key: &StoreKey) -> Result<(), StoreError> {
        (**self).remove(kind, key).await
    }
}

/// In-memory [`StateStore`] for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, StoreKey), Value>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, StoreKey), Value>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::new("memory store mutex poisoned"))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn save(&self, kind: &str, key: StoreKey, value: Value) -> Result<(), StoreError> {
        self.locked()?.insert((kind.to_owned(), key), value);
        Ok(())
    }

    async fn load(&self, kind: &str, key: &StoreKey) -> Result<Option<Value>, StoreError> {
        Ok(self.locked()?.get(&(kind.to_owned(), key.clone())).cloned())
    }

    async fn load_all(&self, kind: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .locked()?
            .iter()
            .filter(|((entry_kind, _), _)| entry_kind == kind)
            .map(|(_, value)| value.clone())
            .collect())
    }

    async fn remove(&self, kind: &str, key: &StoreKey) -> Result<(), StoreError> {
        self.locked()?.remove(&(kind.to_owned(), key.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn save_load_remove_cycle() {
        let store = MemoryStore::new();
        let key = StoreKey::primary("!r:x.org");

        store.save("room", key.clone(), json!({"v": 1})).await.unwrap();
        assert_eq!(store.load("room", &key).await.unwrap(), Some(json!({"v": 1})));

        store.save("room", key.clone(), json!({"v": 2})).await.unwrap();
        assert_eq!(store.load_all("room").await.unwrap(), vec![json!({"v": 2})]);

        store.remove("room", &key).await.unwrap();
        assert_eq!(store.load("room", &key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn composite_keys_do_not_collide_with_primary() {
        let store = MemoryStore::new();
        let composite = StoreKey::composite(["@a:x.org", "DEVICE"]);
        store.save("credentials", composite.clone(), json!({"token": "t"})).await.unwrap();
        assert_eq!(
            store.load("credentials", &StoreKey::primary("@a:x.org")).await.unwrap(),
            None,
        );
        assert!(store.load("credentials", &composite).await.unwrap().is_some());
    }
}
