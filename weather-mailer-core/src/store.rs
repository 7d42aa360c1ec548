//! Subscriber persistence.
//!
//! The backing store only knows how to load and save the whole list;
//! [`SubscriberList`] layers uniqueness and a single-writer mutation path on top.

use async_trait::async_trait;
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::Mutex;

use crate::error::PersistenceError;

#[async_trait]
pub trait SubscriberStore: Send + Sync + Debug {
    async fn load(&self) -> Result<Vec<String>, PersistenceError>;

    /// Replace the persisted list.
    async fn save(&self, subscribers: &[String]) -> Result<(), PersistenceError>;
}

/// Pretty-printed JSON array of strings on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io { path: self.path.display().to_string(), source }
    }
}

#[async_trait]
impl SubscriberStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no subscriber file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&contents)?)
    }

    async fn save(&self, subscribers: &[String]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(subscribers)?;

        // Write then rename so a crash never leaves a truncated list behind.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| self.io_error(e))?;

        tracing::debug!(count = subscribers.len(), path = %self.path.display(), "subscribers saved");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

/// Subscriber list with serialized writes.
///
/// Every `subscribe` holds the write lock across its load-modify-save, so
/// concurrent signups never lose each other's updates.
#[derive(Debug)]
pub struct SubscriberList {
    store: Arc<dyn SubscriberStore>,
    write_lock: Mutex<()>,
}

impl SubscriberList {
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self { store, write_lock: Mutex::new(()) }
    }

    /// Current subscribers, first-seen order, exact-match duplicates removed.
    pub async fn load(&self) -> Result<Vec<String>, PersistenceError> {
        let mut list = self.store.load().await?;
        dedup_in_order(&mut list);
        Ok(list)
    }

    /// Append `email` unless it is already present, then persist.
    pub async fn subscribe(&self, email: &str) -> Result<SubscribeOutcome, PersistenceError> {
        let _guard = self.write_lock.lock().await;

        let mut list = self.load().await?;
        if list.iter().any(|e| e == email) {
            tracing::debug!(email, "already subscribed");
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        list.push(email.to_string());
        self.store.save(&list).await?;
        tracing::info!(email, total = list.len(), "subscriber added");
        Ok(SubscribeOutcome::Added)
    }
}

fn dedup_in_order(list: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    list.retain(|e| seen.insert(e.clone()));
}
