use crate::pipeline::task_handle::TaskEventSink;
use crate::pipeline::types::{AnalysisResult, PlaybackCommand};
use crate::MediaId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// The remote service could not be contacted, so the request was never dispatched.
#[derive(Debug, thiserror::Error)]
#[error("Unable to dispatch request: {0}")]
pub struct DispatchError(BoxedError);

impl DispatchError {
    pub fn new(error: impl Into<BoxedError>) -> Self {
        Self(error.into())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unable to deliver playback command: {0}")]
pub struct CommandError(BoxedError);

impl CommandError {
    pub fn new(error: impl Into<BoxedError>) -> Self {
        Self(error.into())
    }
}

//
// Download
//
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRequest {
    pub media_id: MediaId,
    pub quality: u32,
    pub file_formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadFeedback {
    pub percent: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub locations: Vec<String>,
}

pub type DownloadSink = TaskEventSink<DownloadFeedback, DownloadResult>;

#[async_trait]
pub trait AudioDownloader {
    async fn request_download(
        &self,
        request: DownloadRequest,
        sink: DownloadSink,
    ) -> Result<(), DispatchError>;
}

//
// Analysis
//
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetAlgorithm {
    Hfc,
    Complex,
    ComplexPhase,
    Flux,
    Melflux,
    Rms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmAlgorithm {
    Multifeature,
    Degara,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAlgorithm {
    Hamming,
    Hann,
    Triangular,
    Square,
    Blackmanharris62,
    Blackmanharris92,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRequest {
    pub location: String,
    pub onset: OnsetAlgorithm,
    pub rhythm: RhythmAlgorithm,
    pub window: WindowAlgorithm,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisFeedback {
    pub phase: String,
}

pub type AnalysisSink = TaskEventSink<AnalysisFeedback, AnalysisResult>;

#[async_trait]
pub trait AudioAnalyzer {
    async fn request_analysis(
        &self,
        request: AnalysisRequest,
        sink: AnalysisSink,
    ) -> Result<(), DispatchError>;
}

//
// Playback
//
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackRequest {
    pub location: String,
    pub characteristics: AnalysisResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackFeedback {
    pub name: String,
    pub position: Duration,
    pub duration: Duration,
    pub paused: bool,
    /// The player has stopped and is about to report its result.
    pub stopped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackResult {
    pub was_stopped: bool,
}

pub type PlaybackSink = TaskEventSink<PlaybackFeedback, PlaybackResult>;

#[async_trait]
pub trait SoundPlayer {
    async fn request_playback(
        &self,
        request: PlaybackRequest,
        sink: PlaybackSink,
    ) -> Result<(), DispatchError>;
    async fn send_command(&self, command: PlaybackCommand) -> Result<(), CommandError>;
}
