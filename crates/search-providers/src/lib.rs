mod youtube;

use serde::{Deserialize, Serialize};
use std::ops::Deref;

pub use youtube::*;

/// A single video found by the search provider, in the shape shown in the search results list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoListing {
    pub video_id: VideoId,
    pub title: String,
    pub author: String,
    pub duration: Option<String>,
    pub view_count: Option<String>,
    pub thumbnail_url: Option<String>,
}

pub type VideoListings = Vec<VideoListing>;

#[derive(Eq, PartialEq, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub(crate) String);

impl From<String> for VideoId {
    fn from(value: String) -> Self {
        VideoId(value)
    }
}

impl Deref for VideoId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
