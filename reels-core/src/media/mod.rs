mod error;
mod types;

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use crate::config::{ToolsSection, TranscodeSection};
use crate::exec::{run_capture, CommandRunner, ExecError};

pub use error::{MediaError, MediaResult};
pub use types::{AudioOutcome, ProbeInfo};

/// Fetches source material through the external download tool.
pub struct Downloader {
    runner: Arc<dyn CommandRunner>,
    bin: String,
    user_agent: String,
}

impl Downloader {
    pub fn new(tools: &ToolsSection, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            bin: tools.ytdlp_bin.clone(),
            user_agent: tools.user_agent.clone(),
        }
    }

    /// Downloads `url` into `dest` as a single merged MP4. Playlist expansion
    /// is disabled: one URL fetches one item.
    pub async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<()> {
        let args = vec![
            "-f".to_string(),
            "bestvideo*+bestaudio/best".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "--no-playlist".to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            "-o".to_string(),
            dest.to_string_lossy().to_string(),
            url.to_string(),
        ];
        run_capture(self.runner.as_ref(), &self.bin, &args)
            .await
            .map(|_| ())
            .map_err(|err| MediaError::Download(failure_text(err)))
    }
}

/// Produces the final renditions from a raw download.
pub struct Transcoder {
    runner: Arc<dyn CommandRunner>,
    bin: String,
    config: TranscodeSection,
}

impl Transcoder {
    pub fn new(
        tools: &ToolsSection,
        config: TranscodeSection,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            runner,
            bin: tools.ffmpeg_bin.clone(),
            config,
        }
    }

    /// Normalizes `src` into `dst`: audio stripped, rescaled to the target
    /// width (height follows the aspect ratio, rounded to an even value),
    /// constant frame rate, broad-compatibility pixel format, and container
    /// metadata moved up front for progressive playback.
    pub async fn normalize(&self, src: &Path, dst: &Path) -> MediaResult<()> {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            src.to_string_lossy().to_string(),
            "-an".to_string(),
            "-vf".to_string(),
            format!("scale={}:-2", self.config.target_width),
            "-r".to_string(),
            self.config.frame_rate.to_string(),
            "-pix_fmt".to_string(),
            self.config.pixel_format.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            dst.to_string_lossy().to_string(),
        ];
        run_capture(self.runner.as_ref(), &self.bin, &args)
            .await
            .map(|_| ())
            .map_err(|err| MediaError::Transcode(failure_text(err)))
    }

    /// Extracts an uncompressed PCM track from `src` into `dst`. Best-effort:
    /// any failure (a source without audio being the common one) is reported
    /// as [`AudioOutcome::Skipped`] and a partial output file is removed.
    pub async fn extract_audio(&self, src: &Path, dst: &Path) -> AudioOutcome {
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            src.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            "-ar".to_string(),
            self.config.audio_sample_rate.to_string(),
            "-ac".to_string(),
            self.config.audio_channels.to_string(),
            dst.to_string_lossy().to_string(),
        ];
        match run_capture(self.runner.as_ref(), &self.bin, &args).await {
            Ok(_) => AudioOutcome::Extracted(dst.to_path_buf()),
            Err(err) => {
                let reason = failure_text(err);
                warn!(source = %src.display(), reason = %reason, "audio extraction skipped");
                if let Err(remove_err) = fs::remove_file(dst).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            path = %dst.display(),
                            error = %remove_err,
                            "failed to remove partial audio file"
                        );
                    }
                }
                AudioOutcome::Skipped { reason }
            }
        }
    }
}

/// Read-only inspection of finished media files via the prober binary.
pub struct MediaProber {
    runner: Arc<dyn CommandRunner>,
    bin: String,
}

impl MediaProber {
    pub fn new(tools: &ToolsSection, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            bin: tools.ffprobe_bin.clone(),
        }
    }

    /// Extracts duration and dimensions from `path`. Only the first video
    /// stream is considered.
    pub async fn probe(&self, path: &Path) -> MediaResult<ProbeInfo> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=width,height".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let stdout = run_capture(self.runner.as_ref(), &self.bin, &args)
            .await
            .map_err(|err| MediaError::Probe(failure_text(err)))?;
        parse_probe_output(&stdout)
    }
}

fn parse_probe_output(payload: &str) -> MediaResult<ProbeInfo> {
    let parsed: FfprobeOutput =
        serde_json::from_str(payload).map_err(|err| MediaError::Probe(err.to_string()))?;
    let stream = parsed
        .streams
        .first()
        .ok_or(MediaError::MissingVideoStream)?;
    let width = stream.width.ok_or(MediaError::MissingVideoStream)?;
    let height = stream.height.ok_or(MediaError::MissingVideoStream)?;
    let duration = parsed
        .format
        .duration
        .as_deref()
        .and_then(|value| value.parse::<f64>().ok())
        .ok_or_else(|| MediaError::Probe("container duration missing".into()))?;
    Ok(ProbeInfo {
        duration,
        width,
        height,
    })
}

/// Prefer the tool's own stderr as the diagnostic; fall back to the rendered
/// error when the stream was empty.
fn failure_text(err: ExecError) -> String {
    match err {
        ExecError::CommandFailure {
            command,
            status,
            stderr,
        } => {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                format!("{command} exited with status {status:?}")
            } else {
                trimmed.to_string()
            }
        }
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct FfprobeFormat {
    #[serde(default)]
    duration: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Output;
    use std::sync::Mutex;

    use tempfile::tempdir;
    use tokio::process::Command;

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;
    #[cfg(windows)]
    use std::os::windows::process::ExitStatusExt;

    fn tools() -> ToolsSection {
        ToolsSection {
            ytdlp_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            user_agent: "reelsd-test/0.1".to_string(),
        }
    }

    fn transcode() -> TranscodeSection {
        TranscodeSection {
            target_width: 720,
            frame_rate: 20,
            pixel_format: "yuv420p".to_string(),
            audio_sample_rate: 44100,
            audio_channels: 2,
        }
    }

    /// Records every invocation and replays canned outputs, newest first.
    struct RecordingRunner {
        outputs: Mutex<Vec<Output>>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl RecordingRunner {
        fn new(outputs: Vec<Output>) -> Self {
            Self {
                outputs: Mutex::new(outputs),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, command: &mut Command) -> std::io::Result<Output> {
            let std_command = command.as_std();
            let program = std_command.get_program().to_string_lossy().to_string();
            let args = std_command
                .get_args()
                .map(|arg| arg.to_string_lossy().to_string())
                .collect();
            self.calls.lock().unwrap().push((program, args));
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| std::io::Error::other("no output"))
        }
    }

    fn success() -> Output {
        Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    fn failure(stderr: &str) -> Output {
        Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn downloader_builds_single_item_fetch() {
        let runner = Arc::new(RecordingRunner::new(vec![success()]));
        let downloader = Downloader::new(&tools(), runner.clone());
        downloader
            .fetch("https://example.com/v/abc", Path::new("/tmp/abc_raw.mp4"))
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        let (program, args) = &calls[0];
        assert_eq!(program, "yt-dlp");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.contains(&"reelsd-test/0.1".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/v/abc");
    }

    #[tokio::test]
    async fn normalize_strips_audio_and_fixes_scale() {
        let runner = Arc::new(RecordingRunner::new(vec![success()]));
        let transcoder = Transcoder::new(&tools(), transcode(), runner.clone());
        transcoder
            .normalize(Path::new("/tmp/raw.mp4"), Path::new("/tmp/out.mp4"))
            .await
            .unwrap();

        let calls = runner.calls.lock().unwrap();
        let (program, args) = &calls[0];
        assert_eq!(program, "ffmpeg");
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"scale=720:-2".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[tokio::test]
    async fn transcode_failure_surfaces_stderr() {
        let runner = Arc::new(RecordingRunner::new(vec![failure("invalid data found")]));
        let transcoder = Transcoder::new(&tools(), transcode(), runner);
        let err = transcoder
            .normalize(Path::new("/tmp/raw.mp4"), Path::new("/tmp/out.mp4"))
            .await
            .unwrap_err();
        match err {
            MediaError::Transcode(text) => assert_eq!(text, "invalid data found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn extract_audio_failure_is_absorbed_and_partial_file_removed() {
        let dir = tempdir().unwrap();
        let dst = dir.path().join("abc.wav");
        std::fs::write(&dst, b"partial").unwrap();

        let runner = Arc::new(RecordingRunner::new(vec![failure(
            "Output file does not contain any stream",
        )]));
        let transcoder = Transcoder::new(&tools(), transcode(), runner);
        let outcome = transcoder
            .extract_audio(Path::new("/tmp/raw.mp4"), &dst)
            .await;

        assert!(!outcome.is_extracted());
        assert!(!dst.exists());
        match outcome {
            AudioOutcome::Skipped { reason } => {
                assert!(reason.contains("does not contain any stream"));
            }
            AudioOutcome::Extracted(_) => panic!("extraction should have been skipped"),
        }
    }

    #[tokio::test]
    async fn probe_parses_structured_output() {
        let payload = r#"{
            "streams": [{"width": 720, "height": 1280}],
            "format": {"duration": "10.000000"}
        }"#;
        let runner = Arc::new(RecordingRunner::new(vec![Output {
            status: std::process::ExitStatus::from_raw(0),
            stdout: payload.as_bytes().to_vec(),
            stderr: Vec::new(),
        }]));
        let prober = MediaProber::new(&tools(), runner);
        let info = prober.probe(Path::new("/tmp/out.mp4")).await.unwrap();
        assert_eq!(
            info,
            ProbeInfo {
                duration: 10.0,
                width: 720,
                height: 1280,
            }
        );
    }

    #[test]
    fn probe_rejects_streamless_payload() {
        let err = parse_probe_output(r#"{"streams": [], "format": {"duration": "3.0"}}"#)
            .unwrap_err();
        assert!(matches!(err, MediaError::MissingVideoStream));
    }

    #[test]
    fn probe_rejects_missing_duration() {
        let err = parse_probe_output(r#"{"streams": [{"width": 10, "height": 10}], "format": {}}"#)
            .unwrap_err();
        assert!(matches!(err, MediaError::Probe(_)));
    }
}
