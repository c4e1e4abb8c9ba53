mod health;
mod playback;
mod queue;
mod search;

pub(crate) use health::readiness_check;
pub(crate) use playback::issue_playback_command;
pub(crate) use queue::{enqueue_item, get_queue};
pub(crate) use search::search_videos;
