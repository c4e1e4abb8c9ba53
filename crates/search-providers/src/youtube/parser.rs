use crate::{VideoListing, VideoListings};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSearchResponse {
    Wrapped { result: Vec<Value> },
    Bare(Vec<Value>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawViewCount {
    Text { short: Option<String> },
    Number(u64),
}

#[derive(Deserialize)]
struct RawThumbnail {
    url: String,
}

#[derive(Deserialize)]
struct RawChannel {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVideo {
    #[serde(alias = "videoId")]
    id: String,
    title: String,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    length_seconds: Option<u64>,
    #[serde(default)]
    view_count: Option<RawViewCount>,
    #[serde(default, alias = "videoThumbnails")]
    thumbnails: Vec<RawThumbnail>,
    #[serde(default)]
    channel: Option<RawChannel>,
    #[serde(default)]
    author: Option<String>,
}

impl From<RawVideo> for VideoListing {
    fn from(raw: RawVideo) -> Self {
        let duration = raw
            .duration
            .or_else(|| raw.length_seconds.map(format_duration));
        let view_count = raw.view_count.and_then(|count| match count {
            RawViewCount::Text { short } => short,
            RawViewCount::Number(number) => Some(format_short_count(number)),
        });
        let author = raw
            .channel
            .map(|channel| channel.name)
            .or(raw.author)
            .unwrap_or_default();

        VideoListing {
            video_id: raw.id.into(),
            title: raw.title,
            author,
            duration,
            view_count,
            thumbnail_url: raw.thumbnails.into_iter().next().map(|thumbnail| thumbnail.url),
        }
    }
}

pub(crate) fn format_duration(seconds: u64) -> String {
    let (hours, minutes, seconds) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

pub(crate) fn format_short_count(count: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];

    for (size, suffix) in UNITS {
        if count >= size {
            let value = format!("{:.1}", count as f64 / size as f64);
            let value = value.strip_suffix(".0").unwrap_or(&value);

            return format!("{}{}", value, suffix);
        }
    }

    count.to_string()
}

fn is_video(entry: &Value) -> bool {
    match entry.get("type").and_then(Value::as_str) {
        Some(kind) => kind == "video",
        None => true,
    }
}

pub(crate) fn parse_search_results(raw: &str, limit: usize) -> Result<VideoListings, ParseError> {
    let entries = match serde_json::from_str(raw)? {
        RawSearchResponse::Wrapped { result } => result,
        RawSearchResponse::Bare(entries) => entries,
    };

    let results = entries
        .into_iter()
        .filter(is_video)
        .filter_map(|entry| match serde_json::from_value::<RawVideo>(entry) {
            Ok(video) => Some(VideoListing::from(video)),
            Err(error) => {
                debug!(?error, "Skipping malformed search result");
                None
            }
        })
        .take(limit)
        .collect();

    Ok(results)
}
