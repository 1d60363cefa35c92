mod error;
mod types;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use url::Url;

use crate::config::ReelsConfig;
use crate::exec::{CommandRunner, SystemCommandRunner};
use crate::fingerprint::fingerprint;
use crate::media::{Downloader, MediaProber, Transcoder};
use crate::store::{ClearReport, ReelMetadata, ReelStore};

pub use error::{ProcessorError, ProcessorResult};
pub use types::Reel;

/// Orchestrates the creation pipeline: cache check, download, normalize,
/// best-effort audio extraction, probe, metadata write.
pub struct ReelProcessor {
    store: ReelStore,
    downloader: Downloader,
    transcoder: Transcoder,
    prober: MediaProber,
    inflight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ReelProcessor {
    pub fn new(
        config: &ReelsConfig,
        store: ReelStore,
        runner: Option<Arc<dyn CommandRunner>>,
    ) -> Self {
        let runner = runner.unwrap_or_else(|| Arc::new(SystemCommandRunner));
        Self {
            downloader: Downloader::new(&config.tools, runner.clone()),
            transcoder: Transcoder::new(&config.tools, config.transcode.clone(), runner.clone()),
            prober: MediaProber::new(&config.tools, runner),
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ReelStore {
        &self.store
    }

    /// Creates the reel for `url`, or returns the cached one. Concurrent
    /// requests for the same fingerprint serialize on a per-fingerprint lock,
    /// so only the first performs the pipeline; the rest hit the cache.
    pub async fn create(&self, url: &str) -> ProcessorResult<Reel> {
        let parsed =
            Url::parse(url).map_err(|err| ProcessorError::InvalidUrl(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProcessorError::InvalidUrl(format!(
                "unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let id = fingerprint(url);
        let lock = self.inflight_lock(&id);
        let _guard = lock.lock().await;

        // A concurrent request may have produced this reel while we waited.
        if self.store.exists(&id).await {
            let metadata = self.store.read(&id).await?;
            info!(id = %id, "reel served from cache");
            return Ok(Reel { id, metadata });
        }

        let raw = self.store.raw_path(&id);
        let video = self.store.video_path(&id);
        let audio = self.store.audio_path(&id);

        if let Err(err) = self.downloader.fetch(url, &raw).await {
            remove_quietly(&raw).await;
            return Err(err.into());
        }
        if let Err(err) = self.transcoder.normalize(&raw, &video).await {
            remove_quietly(&video).await;
            remove_quietly(&raw).await;
            return Err(err.into());
        }
        let audio_outcome = self.transcoder.extract_audio(&raw, &audio).await;
        remove_quietly(&raw).await;

        let probe = self.prober.probe(&video).await?;
        let metadata = ReelMetadata {
            duration: probe.duration,
            width: probe.width,
            height: probe.height,
            has_audio: audio_outcome.is_extracted(),
        };
        self.store.write(&id, &metadata).await?;
        info!(
            id = %id,
            duration = metadata.duration,
            width = metadata.width,
            height = metadata.height,
            has_audio = metadata.has_audio,
            "reel created"
        );
        Ok(Reel { id, metadata })
    }

    /// Wipes every cached artifact, reporting per-area removal counts.
    pub async fn clear(&self) -> ProcessorResult<ClearReport> {
        Ok(self.store.clear().await?)
    }

    fn inflight_lock(&self, id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inflight.lock().unwrap();
        map.entry(id.to_string()).or_default().clone()
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::config::{PathsSection, ServerSection, ToolsSection, TranscodeSection};
    use crate::store::StorageLayout;

    fn config(base: &Path) -> ReelsConfig {
        ReelsConfig {
            server: ServerSection {
                listen_host: "127.0.0.1".to_string(),
                listen_port: 0,
            },
            paths: PathsSection {
                base_dir: base.to_string_lossy().to_string(),
                storage_dir: "storage".to_string(),
                tmp_dir: "tmp".to_string(),
            },
            tools: ToolsSection {
                ytdlp_bin: "yt-dlp".to_string(),
                ffmpeg_bin: "ffmpeg".to_string(),
                ffprobe_bin: "ffprobe".to_string(),
                user_agent: "reelsd-test/0.1".to_string(),
            },
            transcode: TranscodeSection {
                target_width: 720,
                frame_rate: 20,
                pixel_format: "yuv420p".to_string(),
                audio_sample_rate: 44100,
                audio_channels: 2,
            },
        }
    }

    #[tokio::test]
    async fn rejects_unparseable_urls_before_running_tools() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let layout = StorageLayout::from_config(&config);
        layout.ensure_directories().unwrap();
        let processor = ReelProcessor::new(&config, ReelStore::new(layout), None);

        let err = processor.create("not a url").await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidUrl(_)));

        let err = processor.create("ftp://example.com/v.mp4").await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidUrl(_)));
    }
}
