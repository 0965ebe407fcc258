//! Reel engine: page discovery, external tool runs and effect execution.
mod decode;
mod discovery;
mod download;
mod engine;
mod http_provider;
mod lines;
mod merge;
mod persist;
mod provider;
mod status;
mod tool;
mod types;

pub use decode::{decode_page, DecodeError, DecodedPage};
pub use discovery::{DiscoveryConfig, DiscoveryEngine};
pub use download::DownloadController;
pub use engine::{EngineConfig, EngineError, EngineHandle, Interrupts};
pub use http_provider::{HttpProviderSettings, HttpSnapshotProvider};
pub use lines::OutputLineCodec;
pub use merge::{MergeError, Merger};
pub use persist::{ensure_output_dir, promote_file, PersistError};
pub use provider::{PageSnapshotProvider, ProviderError, SnapshotEntry};
pub use status::{ChannelStatusSink, StatusSink};
pub use tool::{background_command, ConcatToolConfig, FetchToolConfig};
pub use types::{BatchOutcome, TaskFailure};
