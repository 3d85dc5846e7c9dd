use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KeyValueClient, StateMode};
use crate::error::BackendError;

/// A state document: a JSON object.
pub type StateValue = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait State: Send + Sync {
    fn mode(&self) -> StateMode;

    async fn get_state(&self, key: &str) -> Result<Option<StateValue>, BackendError>;

    async fn set_state(&self, key: &str, value: StateValue) -> Result<(), BackendError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoState;

#[async_trait]
impl State for NoState {
    fn mode(&self) -> StateMode {
        StateMode::None
    }

    async fn get_state(&self, _key: &str) -> Result<Option<StateValue>, BackendError> {
        Ok(None)
    }

    async fn set_state(&self, _key: &str, _value: StateValue) -> Result<(), BackendError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryState {
    entries: Mutex<HashMap<String, StateValue>>,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, StateValue>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl State for InMemoryState {
    fn mode(&self) -> StateMode {
        StateMode::InMemory
    }

    async fn get_state(&self, key: &str) -> Result<Option<StateValue>, BackendError> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set_state(&self, key: &str, value: StateValue) -> Result<(), BackendError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }
}

/// State kept as JSON documents in an external key-value store.
pub struct RemoteState {
    mode: StateMode,
    client: Box<dyn KeyValueClient>,
}

impl RemoteState {
    pub fn new(mode: StateMode, client: Box<dyn KeyValueClient>) -> Self {
        Self { mode, client }
    }
}

#[async_trait]
impl State for RemoteState {
    fn mode(&self) -> StateMode {
        self.mode
    }

    async fn get_state(&self, key: &str) -> Result<Option<StateValue>, BackendError> {
        match self.client.get(key).await? {
            Some(bytes) if !bytes.is_empty() => Ok(Some(serde_json::from_slice(&bytes)?)),
            _ => Ok(None),
        }
    }

    async fn set_state(&self, key: &str, value: StateValue) -> Result<(), BackendError> {
        let bytes = serde_json::to_vec(&value)?;
        self.client.set(key, bytes).await
    }
}
