use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::config::ReelsConfig;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("invalid metadata record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The four flat storage areas backing the reel cache.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub videos: PathBuf,
    pub audio: PathBuf,
    pub meta: PathBuf,
    pub tmp: PathBuf,
}

impl StorageLayout {
    pub fn from_config(config: &ReelsConfig) -> Self {
        let storage = config.resolve_path(&config.paths.storage_dir);
        Self {
            videos: storage.join("videos"),
            audio: storage.join("audio"),
            meta: storage.join("meta"),
            tmp: config.resolve_path(&config.paths.tmp_dir),
        }
    }

    pub fn ensure_directories(&self) -> StoreResult<()> {
        for dir in [&self.videos, &self.audio, &self.meta, &self.tmp] {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Metadata record persisted beside each cached reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReelMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Files removed from each storage area by a bulk clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub videos: usize,
    pub audio: usize,
    pub meta: usize,
    pub tmp: usize,
}

/// Directory-based store mapping a fingerprint to its video, optional audio,
/// and metadata record. The processor is the sole writer; readers only ever
/// see a reel once both the video file and the metadata record exist.
#[derive(Debug, Clone)]
pub struct ReelStore {
    layout: StorageLayout,
}

impl ReelStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn video_path(&self, id: &str) -> PathBuf {
        self.layout.videos.join(format!("{id}.mp4"))
    }

    pub fn audio_path(&self, id: &str) -> PathBuf {
        self.layout.audio.join(format!("{id}.wav"))
    }

    pub fn meta_path(&self, id: &str) -> PathBuf {
        self.layout.meta.join(format!("{id}.json"))
    }

    pub fn raw_path(&self, id: &str) -> PathBuf {
        self.layout.tmp.join(format!("{id}_raw.mp4"))
    }

    /// The sole cache-hit test: final video and metadata record both present.
    /// Audio presence is recorded inside the metadata, not used as a gate.
    pub async fn exists(&self, id: &str) -> bool {
        let video = fs::try_exists(self.video_path(id)).await.unwrap_or(false);
        let meta = fs::try_exists(self.meta_path(id)).await.unwrap_or(false);
        video && meta
    }

    pub async fn read(&self, id: &str) -> StoreResult<ReelMetadata> {
        let path = self.meta_path(id);
        let bytes = fs::read(&path).await.map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn write(&self, id: &str, metadata: &ReelMetadata) -> StoreResult<()> {
        let path = self.meta_path(id);
        let payload = serde_json::to_vec(metadata)?;
        fs::write(&path, payload)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }

    /// Unconditional wipe of all four areas; not scoped by id. Counts only
    /// regular files, and a missing directory contributes zero.
    pub async fn clear(&self) -> StoreResult<ClearReport> {
        Ok(ClearReport {
            videos: clear_dir(&self.layout.videos).await?,
            audio: clear_dir(&self.layout.audio).await?,
            meta: clear_dir(&self.layout.meta).await?,
            tmp: clear_dir(&self.layout.tmp).await?,
        })
    }
}

async fn clear_dir(dir: &Path) -> StoreResult<usize> {
    if !fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(0);
    }
    let mut entries = fs::read_dir(dir).await.map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        if path.is_file() {
            fs::remove_file(&path).await.map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            removed += 1;
        }
    }
    Ok(removed)
}
