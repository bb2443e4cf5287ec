//! Snapshot persistence.

use async_trait::async_trait;
use chrono::Utc;
use insider_core::PortfolioSnapshot;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// File holding the last persisted snapshot.
pub const DATA_FILE: &str = "wallet_data.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Load/save of the baseline snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last saved snapshot. A store with nothing saved yet returns
    /// an empty snapshot.
    async fn load(&self) -> StoreResult<PortfolioSnapshot>;

    async fn save(&self, snapshot: &PortfolioSnapshot) -> StoreResult<()>;
}

/// Pretty-printed JSON file under a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE)
    }

    /// Check if a non-empty snapshot has been saved.
    pub async fn has_data(&self) -> bool {
        matches!(self.load().await, Ok(snapshot) if !snapshot.is_empty())
    }

    /// Copy the current data into `wallet_data_backup_{unix}.json`.
    pub async fn backup(&self) -> StoreResult<PathBuf> {
        let snapshot = self.load().await?;
        let path = self
            .data_dir
            .join(format!("wallet_data_backup_{}.json", Utc::now().timestamp()));
        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&path, serde_json::to_vec_pretty(&snapshot)?).await?;
        Ok(path)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> StoreResult<PortfolioSnapshot> {
        let path = self.data_path();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No saved snapshot, starting empty");
                return Ok(PortfolioSnapshot::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, snapshot: &PortfolioSnapshot) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let path = self.data_path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), wallets = snapshot.len(), "Saved snapshot");
        Ok(())
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<PortfolioSnapshot>>,
    fail: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: PortfolioSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            fail: Mutex::new(false),
        }
    }

    /// Make every load and save fail.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(|p| p.into_inner()) = fail;
    }

    /// Last saved snapshot, if any.
    pub fn saved(&self) -> Option<PortfolioSnapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn check(&self) -> StoreResult<()> {
        if *self.fail.lock().unwrap_or_else(|p| p.into_inner()) {
            Err(StoreError::Io(std::io::Error::other("memory store failing")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> StoreResult<PortfolioSnapshot> {
        self.check()?;
        Ok(self.saved().unwrap_or_default())
    }

    async fn save(&self, snapshot: &PortfolioSnapshot) -> StoreResult<()> {
        self.check()?;
        *self.snapshot.lock().unwrap_or_else(|p| p.into_inner()) = Some(snapshot.clone());
        Ok(())
    }
}
