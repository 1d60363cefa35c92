use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("download failed: {0}")]
    Download(String),
    #[error("transcode failed: {0}")]
    Transcode(String),
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("probed file has no video stream")]
    MissingVideoStream,
}

pub type MediaResult<T> = Result<T, MediaError>;
