use thiserror::Error;

use crate::media::MediaError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("invalid source url: {0}")]
    InvalidUrl(String),
    #[error("download failed: {0}")]
    Download(String),
    #[error("transcode failed: {0}")]
    Transcode(String),
    #[error("probe failed: {0}")]
    Probe(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<MediaError> for ProcessorError {
    fn from(error: MediaError) -> Self {
        match error {
            MediaError::Download(text) => ProcessorError::Download(text),
            MediaError::Transcode(text) => ProcessorError::Transcode(text),
            MediaError::Probe(text) => ProcessorError::Probe(text),
            err @ MediaError::MissingVideoStream => ProcessorError::Probe(err.to_string()),
        }
    }
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;
