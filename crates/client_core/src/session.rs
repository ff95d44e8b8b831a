use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::domain::UserRecord;
use storage::Storage;
use tokio::sync::Mutex;
use tracing::warn;

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Durable named-string storage backing the session.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>>;
    /// Writes all entries or none.
    async fn write(&self, entries: &[(&str, &str)]) -> Result<()>;
    /// Removes all keys or none; missing keys are not an error.
    async fn remove(&self, keys: &[&str]) -> Result<()>;
}

#[async_trait]
impl KeyValueStore for Storage {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.read_value(key).await
    }

    async fn write(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.write_values(entries).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.remove_values(keys).await.map(|_| ())
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn write(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut values = self.values.lock().await;
        for (key, value) in entries {
            values.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut values = self.values.lock().await;
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<UserRecord>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Token and identity record of the signed-in user.
///
/// Nothing is cached: every read goes to the backing store, so a clear made
/// by one call is seen by the next request built anywhere else.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn get(&self) -> Result<Session> {
        Ok(Session {
            token: self.token().await?,
            user: self.user().await?,
        })
    }

    pub async fn token(&self) -> Result<Option<String>> {
        let token = self
            .backend
            .read(TOKEN_KEY)
            .await
            .context("failed to read session token")?;
        Ok(token.filter(|token| !token.is_empty()))
    }

    /// Best-effort read of the identity record; an unreadable record counts
    /// as absent.
    pub async fn user(&self) -> Result<Option<UserRecord>> {
        let Some(raw) = self
            .backend
            .read(USER_KEY)
            .await
            .context("failed to read session user")?
        else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(error) => {
                warn!(%error, "ignoring malformed persisted user record");
                Ok(None)
            }
        }
    }

    pub async fn set(&self, token: &str, user: &UserRecord) -> Result<()> {
        let user_json = serde_json::to_string(user).context("failed to encode user record")?;
        self.backend
            .write(&[(TOKEN_KEY, token), (USER_KEY, user_json.as_str())])
            .await
            .context("failed to persist session")
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend
            .remove(&[TOKEN_KEY, USER_KEY])
            .await
            .context("failed to clear session")
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
