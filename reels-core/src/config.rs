use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReelsConfig {
    pub server: ServerSection,
    pub paths: PathsSection,
    pub tools: ToolsSection,
    pub transcode: TranscodeSection,
}

impl ReelsConfig {
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.base_dir).join(path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub listen_host: String,
    pub listen_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub base_dir: String,
    pub storage_dir: String,
    pub tmp_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    pub ytdlp_bin: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub user_agent: String,
}

/// Parameters of the normalized rendition and the extracted audio track.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscodeSection {
    pub target_width: u32,
    pub frame_rate: u32,
    pub pixel_format: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u32,
}

pub fn load_reels_config<P: AsRef<Path>>(path: P) -> Result<ReelsConfig> {
    load_toml(path)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
