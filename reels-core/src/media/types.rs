use std::path::PathBuf;

/// Duration and dimensions read back from a finished video file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// Outcome of the best-effort audio extraction step. A failed extraction is
/// recorded as absence, never propagated: a reel without audio is still a
/// valid reel.
#[derive(Debug, Clone)]
pub enum AudioOutcome {
    Extracted(PathBuf),
    Skipped { reason: String },
}

impl AudioOutcome {
    pub fn is_extracted(&self) -> bool {
        matches!(self, AudioOutcome::Extracted(_))
    }
}
