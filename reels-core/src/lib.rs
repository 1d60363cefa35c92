pub mod config;
pub mod error;
pub mod exec;
pub mod fingerprint;
pub mod media;
pub mod processor;
pub mod store;

pub use config::{
    load_reels_config, PathsSection, ReelsConfig, ServerSection, ToolsSection, TranscodeSection,
};
pub use error::{ConfigError, Result};
pub use exec::{run_capture, CommandRunner, ExecError, ExecResult, SystemCommandRunner};
pub use fingerprint::fingerprint;
pub use media::{
    AudioOutcome, Downloader, MediaError, MediaProber, MediaResult, ProbeInfo, Transcoder,
};
pub use processor::{ProcessorError, ProcessorResult, Reel, ReelProcessor};
pub use store::{ClearReport, ReelMetadata, ReelStore, StorageLayout, StoreError, StoreResult};
