//! Reel core: domain types, pure link/progress/merge logic and the
//! presentation state machine.
mod discovery;
mod effect;
mod event;
mod item;
mod merge;
mod msg;
mod normalize;
pub mod progress;
mod sanitize;
mod state;
mod task;
mod update;
mod view_model;

pub use discovery::{DiscoveryError, DiscoverySession, DiscoveryState, DEFAULT_MAX_STABLE_ROUNDS};
pub use effect::Effect;
pub use event::StatusEvent;
pub use item::{LinkItem, TaskId};
pub use merge::{
    concat_list, order_inputs, plan_merge, EpisodePattern, MergeJob, DEFAULT_EPISODE_PATTERN,
    FALLBACK_BASE_NAME,
};
pub use msg::Msg;
pub use normalize::{
    default_normalizer, normalize, NormalizationError, Normalizer, NormalizerConfig,
    MIN_DIGIT_RUN,
};
pub use progress::ProgressRecord;
pub use sanitize::{output_file_name, sanitize_title};
pub use state::{AppState, SessionState};
pub use task::{DownloadTask, TaskState, DEFAULT_MAX_ATTEMPTS};
pub use update::update;
pub use view_model::{AppViewModel, LastPasteStats, LinkRowView, TaskRowView};
