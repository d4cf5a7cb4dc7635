//! Client-local storage and the guide's completion flags.
//!
//! The three flags live in a single record so a reset is one write: there is
//! no partially-reset state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::StorageError;

/// Storage key for the completion flag record.
pub const COMPLETION_FLAGS_KEY: &str = "guide_completion_flags";

/// Key/value storage local to the client (browser local storage, a file, ...).
#[async_trait]
pub trait LocalStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Storage backed by one JSON object on disk. Writes go through a temp file
/// and a rename.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl LocalStorage for JsonFileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }
}

/// Whether each guided flow has already run on this client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionFlags {
    #[serde(default)]
    pub tour_completed: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub onboarding_skipped: bool,
}

impl CompletionFlags {
    pub fn should_launch_onboarding(&self) -> bool {
        !self.onboarding_completed && !self.onboarding_skipped
    }

    pub fn should_launch_tour(&self) -> bool {
        !self.tour_completed
    }
}

/// Reads and writes [`CompletionFlags`] through a [`LocalStorage`].
#[derive(Clone)]
pub struct FlagStore {
    storage: Arc<dyn LocalStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl FlagStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current flags. A corrupt record reads as all-false.
    pub async fn load(&self) -> Result<CompletionFlags, StorageError> {
        let Some(raw) = self.storage.get(COMPLETION_FLAGS_KEY).await? else {
            return Ok(CompletionFlags::default());
        };
        match serde_json::from_str(&raw) {
            Ok(flags) => Ok(flags),
            Err(e) => {
                warn!("Ignoring corrupt completion flags: {}", e);
                Ok(CompletionFlags::default())
            }
        }
    }

    async fn update(
        &self,
        f: impl FnOnce(&mut CompletionFlags),
    ) -> Result<CompletionFlags, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut flags = self.load().await?;
        f(&mut flags);
        let raw = serde_json::to_string(&flags)?;
        self.storage.set(COMPLETION_FLAGS_KEY, &raw).await?;
        Ok(flags)
    }

    pub async fn mark_tour_completed(&self) -> Result<CompletionFlags, StorageError> {
        self.update(|f| f.tour_completed = true).await
    }

    pub async fn mark_onboarding_completed(&self) -> Result<CompletionFlags, StorageError> {
        self.update(|f| f.onboarding_completed = true).await
    }

    pub async fn mark_onboarding_skipped(&self) -> Result<CompletionFlags, StorageError> {
        self.update(|f| f.onboarding_skipped = true).await
    }

    /// Clear all three flags in one storage operation.
    pub async fn reset(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(COMPLETION_FLAGS_KEY).await?;
        info!("Guide completion flags reset");
        Ok(())
    }
}
