use crate::pipeline::orchestrator::PipelineError;
use crate::MediaId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStage {
    Queued,
    Downloading,
    Downloaded,
    Analyzing,
    Ready,
    Playing,
}

impl MediaStage {
    pub(crate) fn can_advance_to(&self, next: MediaStage) -> bool {
        matches!(
            (self, next),
            (MediaStage::Queued, MediaStage::Downloading)
                | (MediaStage::Downloading, MediaStage::Downloaded)
                | (MediaStage::Downloaded, MediaStage::Analyzing)
                | (MediaStage::Analyzing, MediaStage::Ready)
                | (MediaStage::Ready, MediaStage::Playing)
        )
    }
}

/// Descriptive payload of a queued item. Carried through the pipeline untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub view_count: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Characteristics produced by the analysis service and handed to the player as is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub tempo_bpm: f32,
    pub beats: Vec<f32>,
    pub onsets: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub(crate) id: MediaId,
    pub(crate) metadata: MediaMetadata,
    pub(crate) local_location: Option<String>,
    pub(crate) analysis_result: Option<AnalysisResult>,
    pub(crate) stage: MediaStage,
}

impl MediaItem {
    pub(crate) fn new(id: MediaId, metadata: MediaMetadata) -> Self {
        Self {
            id,
            metadata,
            local_location: None,
            analysis_result: None,
            stage: MediaStage::Queued,
        }
    }

    pub fn id(&self) -> &MediaId {
        &self.id
    }

    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    pub fn local_location(&self) -> Option<&str> {
        self.local_location.as_deref()
    }

    pub fn analysis_result(&self) -> Option<&AnalysisResult> {
        self.analysis_result.as_ref()
    }

    pub fn stage(&self) -> MediaStage {
        self.stage
    }

    pub(crate) fn advance(&mut self, next: MediaStage) -> Result<(), PipelineError> {
        if !self.stage.can_advance_to(next) {
            return Err(PipelineError::InvalidTransition {
                id: self.id.clone(),
                from: self.stage,
                to: next,
            });
        }

        self.stage = next;

        Ok(())
    }
}

/// What the orchestrator knows about the player, used to resolve the toggle control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlayerState {
    pub active: bool,
    pub paused: bool,
    pub stopped_by_user: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackCommand {
    Pause,
    Resume,
    Stop,
    Skip,
}

impl std::fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlaybackCommand::Pause => "pause",
            PlaybackCommand::Resume => "resume",
            PlaybackCommand::Stop => "stop",
            PlaybackCommand::Skip => "skip",
        };

        write!(f, "{}", name)
    }
}

/// A user-facing playback control. `Toggle` has no fixed meaning until resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackControl {
    Pause,
    Resume,
    Stop,
    Skip,
    Toggle,
}

impl PlaybackControl {
    pub fn resolve(self, player_state: &PlayerState) -> PlaybackCommand {
        match self {
            PlaybackControl::Pause => PlaybackCommand::Pause,
            PlaybackControl::Resume => PlaybackCommand::Resume,
            PlaybackControl::Stop => PlaybackCommand::Stop,
            PlaybackControl::Skip => PlaybackCommand::Skip,
            PlaybackControl::Toggle if player_state.paused || !player_state.active => {
                PlaybackCommand::Resume
            }
            PlaybackControl::Toggle => PlaybackCommand::Pause,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown playback control: {0}")]
pub struct UnknownPlaybackControl(String);

impl FromStr for PlaybackControl {
    type Err = UnknownPlaybackControl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pause" => Ok(PlaybackControl::Pause),
            "resume" | "play" => Ok(PlaybackControl::Resume),
            "stop" => Ok(PlaybackControl::Stop),
            "skip" => Ok(PlaybackControl::Skip),
            "toggle" => Ok(PlaybackControl::Toggle),
            _ => Err(UnknownPlaybackControl(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Download,
    Analyze,
    Play,
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum StageFailure {
    #[error("Remote service is unreachable: {0}")]
    Unreachable(String),
    #[error("Request was rejected: {0}")]
    Rejected(String),
    #[error("Operation failed: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemovalReason {
    Finished,
    Stopped,
    Failed { stage: TaskKind, failure: StageFailure },
}

/// Notifications for the GUI collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    ItemQueued {
        id: MediaId,
        metadata: MediaMetadata,
    },
    DownloadProgress {
        id: MediaId,
        percent: f32,
    },
    AnalysisProgress {
        id: MediaId,
        phase: String,
    },
    PlaybackStarting {
        id: MediaId,
    },
    PlaybackProgress {
        position: Duration,
        duration: Duration,
        paused: bool,
        active: bool,
    },
    ItemRemoved {
        id: MediaId,
        reason: RemovalReason,
    },
    CommandFailed {
        command: PlaybackCommand,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSnapshot {
    pub items: Vec<MediaItem>,
    pub player_state: PlayerState,
    /// Position and total duration of the playing item, as last reported by the player.
    #[serde(skip)]
    pub progress: Option<(Duration, Duration)>,
}
