use crate::pipeline::dispatch::PipelineEvent;
use crate::pipeline::orchestrator::PipelineError;
use crate::pipeline::registry::MediaRegistry;
use crate::pipeline::task_handle::{TaskEvent, TaskEventSink, TaskHandle, TaskUpdate};
use crate::pipeline::traits::{
    AnalysisFeedback, AnalysisRequest, AudioAnalyzer, AudioDownloader, CommandError,
    DispatchError, DownloadFeedback, DownloadRequest, DownloadResult, OnsetAlgorithm,
    PlaybackFeedback, PlaybackRequest, PlaybackResult, RhythmAlgorithm, SoundPlayer,
    WindowAlgorithm,
};
use crate::pipeline::types::{
    AnalysisResult, MediaItem, MediaStage, PlaybackCommand, StageFailure, TaskKind,
};
use crate::{MediaId, TaskId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    pub quality: u32,
    pub file_formats: Vec<String>,
    /// Extension of the downloaded file that is handed over to analysis and playback.
    pub playback_format: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            quality: 320,
            file_formats: vec!["m4a".into(), "wav".into()],
            playback_format: "wav".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    pub onset: OnsetAlgorithm,
    pub rhythm: RhythmAlgorithm,
    pub window: WindowAlgorithm,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            onset: OnsetAlgorithm::Hfc,
            rhythm: RhythmAlgorithm::Multifeature,
            window: WindowAlgorithm::Hamming,
        }
    }
}

/// What a download or analysis stage reports back to the orchestrator.
#[derive(Debug, PartialEq)]
pub(crate) enum StageSignal<P> {
    Progress(MediaId, P),
    Advanced(MediaId),
    Failed(MediaId, StageFailure),
}

#[derive(Debug, PartialEq)]
pub(crate) enum PlaybackSignal {
    Progress(PlaybackFeedback),
    Finished(MediaId, bool),
    Failed(MediaId, StageFailure),
}

/// Applies an event to the handle it belongs to and forgets the handle once it is terminal.
fn route<F: Clone, R>(
    handles: &mut HashMap<TaskId, TaskHandle<F>>,
    task_id: TaskId,
    event: TaskEvent<F, R>,
) -> Option<(MediaId, TaskUpdate<F, R>)> {
    let handle = match handles.get_mut(&task_id) {
        Some(handle) => handle,
        None => {
            debug!(%task_id, "Ignoring event of unknown or finished task");
            return None;
        }
    };

    let update = handle.apply(event)?;
    let owner = handle.owner().clone();

    debug!(%task_id, kind = ?handle.kind(), acceptance = ?handle.acceptance(), %owner, "Task event applied");

    if handle.is_terminal() {
        handles.remove(&task_id);
    }

    Some((owner, update))
}

pub(crate) fn select_location(locations: &[String], preferred_format: &str) -> Option<String> {
    let preferred = format!(".{}", preferred_format.to_lowercase());

    locations
        .iter()
        .find(|location| location.to_lowercase().ends_with(&preferred))
        .or_else(|| locations.first())
        .cloned()
}

pub(crate) struct DownloadStage {
    downloader: Arc<dyn AudioDownloader + Send + Sync>,
    settings: DownloadSettings,
    events: UnboundedSender<PipelineEvent>,
    handles: HashMap<TaskId, TaskHandle<DownloadFeedback>>,
}

impl DownloadStage {
    pub(crate) fn new(
        downloader: Arc<dyn AudioDownloader + Send + Sync>,
        settings: DownloadSettings,
        events: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            downloader,
            settings,
            events,
            handles: HashMap::new(),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.handles.len()
    }

    pub(crate) async fn begin(&mut self, item: &MediaItem) -> Result<(), DispatchError> {
        let handle = TaskHandle::new(TaskKind::Download, item.id().clone());
        let sink = TaskEventSink::new(handle.task_id(), self.events.clone(), PipelineEvent::Download);
        let request = DownloadRequest {
            media_id: item.id().clone(),
            quality: self.settings.quality,
            file_formats: self.settings.file_formats.clone(),
        };

        self.downloader.request_download(request, sink).await?;

        info!(id = %item.id(), task_id = %handle.task_id(), "Download requested");

        self.handles.insert(handle.task_id(), handle);

        Ok(())
    }

    pub(crate) fn on_event(
        &mut self,
        registry: &mut MediaRegistry,
        task_id: TaskId,
        event: TaskEvent<DownloadFeedback, DownloadResult>,
    ) -> Result<Option<StageSignal<f32>>, PipelineError> {
        let (owner, update) = match route(&mut self.handles, task_id, event) {
            Some(routed) => routed,
            None => return Ok(None),
        };

        let signal = match update {
            TaskUpdate::Accepted => {
                debug!(id = %owner, "Download accepted");
                return Ok(None);
            }
            TaskUpdate::Feedback(feedback) => StageSignal::Progress(owner, feedback.percent),
            TaskUpdate::Completed(result) => {
                match select_location(&result.locations, &self.settings.playback_format) {
                    Some(location) => {
                        let item = registry
                            .get_mut(&owner)
                            .ok_or_else(|| PipelineError::ItemNotFound(owner.clone()))?;
                        info!(id = %owner, %location, "Audio saved locally");
                        item.local_location = Some(location);
                        item.advance(MediaStage::Downloaded)?;
                        StageSignal::Advanced(owner)
                    }
                    None => StageSignal::Failed(
                        owner,
                        StageFailure::Aborted("Download finished without any local file".into()),
                    ),
                }
            }
            TaskUpdate::Failed(failure) => StageSignal::Failed(owner, failure),
        };

        Ok(Some(signal))
    }
}

pub(crate) struct AnalysisStage {
    analyzer: Arc<dyn AudioAnalyzer + Send + Sync>,
    settings: AnalysisSettings,
    events: UnboundedSender<PipelineEvent>,
    handles: HashMap<TaskId, TaskHandle<AnalysisFeedback>>,
}

impl AnalysisStage {
    pub(crate) fn new(
        analyzer: Arc<dyn AudioAnalyzer + Send + Sync>,
        settings: AnalysisSettings,
        events: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            analyzer,
            settings,
            events,
            handles: HashMap::new(),
        }
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.handles.len()
    }

    pub(crate) async fn begin(
        &mut self,
        id: &MediaId,
        location: &str,
    ) -> Result<(), DispatchError> {
        let handle = TaskHandle::new(TaskKind::Analyze, id.clone());
        let sink = TaskEventSink::new(handle.task_id(), self.events.clone(), PipelineEvent::Analysis);
        let request = AnalysisRequest {
            location: location.to_string(),
            onset: self.settings.onset,
            rhythm: self.settings.rhythm,
            window: self.settings.window,
        };

        self.analyzer.request_analysis(request, sink).await?;

        info!(%id, task_id = %handle.task_id(), "Analysis requested");

        self.handles.insert(handle.task_id(), handle);

        Ok(())
    }

    pub(crate) fn on_event(
        &mut self,
        registry: &mut MediaRegistry,
        task_id: TaskId,
        event: TaskEvent<AnalysisFeedback, AnalysisResult>,
    ) -> Result<Option<StageSignal<String>>, PipelineError> {
        let (owner, update) = match route(&mut self.handles, task_id, event) {
            Some(routed) => routed,
            None => return Ok(None),
        };

        let signal = match update {
            TaskUpdate::Accepted => {
                debug!(id = %owner, "Analysis accepted");
                return Ok(None);
            }
            TaskUpdate::Feedback(feedback) => StageSignal::Progress(owner, feedback.phase),
            TaskUpdate::Completed(result) => {
                let item = registry
                    .get_mut(&owner)
                    .ok_or_else(|| PipelineError::ItemNotFound(owner.clone()))?;
                info!(id = %owner, tempo_bpm = result.tempo_bpm, "Audio analyzed");
                item.analysis_result = Some(result);
                item.advance(MediaStage::Ready)?;
                StageSignal::Advanced(owner)
            }
            TaskUpdate::Failed(failure) => StageSignal::Failed(owner, failure),
        };

        Ok(Some(signal))
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum PlaybackBeginError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Playback of {0} is still outstanding")]
    AlreadyActive(MediaId),
}

/// Owns at most one playback task at a time.
pub(crate) struct PlaybackStage {
    player: Arc<dyn SoundPlayer + Send + Sync>,
    events: UnboundedSender<PipelineEvent>,
    active: Option<TaskHandle<PlaybackFeedback>>,
}

impl PlaybackStage {
    pub(crate) fn new(
        player: Arc<dyn SoundPlayer + Send + Sync>,
        events: UnboundedSender<PipelineEvent>,
    ) -> Self {
        Self {
            player,
            events,
            active: None,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub(crate) fn active_owner(&self) -> Option<&MediaId> {
        self.active.as_ref().map(TaskHandle::owner)
    }

    pub(crate) fn last_feedback(&self) -> Option<&PlaybackFeedback> {
        self.active.as_ref().and_then(TaskHandle::last_feedback)
    }

    pub(crate) async fn begin(
        &mut self,
        id: &MediaId,
        location: &str,
        characteristics: &AnalysisResult,
    ) -> Result<(), PlaybackBeginError> {
        if let Some(handle) = &self.active {
            return Err(PlaybackBeginError::AlreadyActive(handle.owner().clone()));
        }

        let handle = TaskHandle::new(TaskKind::Play, id.clone());
        let sink = TaskEventSink::new(handle.task_id(), self.events.clone(), PipelineEvent::Playback);
        let request = PlaybackRequest {
            location: location.to_string(),
            characteristics: characteristics.clone(),
        };

        self.player.request_playback(request, sink).await?;

        info!(%id, task_id = %handle.task_id(), "Playback requested");

        self.active = Some(handle);

        Ok(())
    }

    pub(crate) async fn send_command(&self, command: PlaybackCommand) -> Result<(), CommandError> {
        self.player.send_command(command).await?;

        info!(%command, "Playback command sent");

        Ok(())
    }

    pub(crate) fn on_event(
        &mut self,
        task_id: TaskId,
        event: TaskEvent<PlaybackFeedback, PlaybackResult>,
    ) -> Option<PlaybackSignal> {
        let handle = match self.active.as_mut() {
            Some(handle) if handle.task_id() == task_id => handle,
            _ => {
                debug!(%task_id, "Ignoring event of stale playback task");
                return None;
            }
        };

        let update = handle.apply(event)?;
        let owner = handle.owner().clone();

        if handle.is_terminal() {
            self.active = None;
        }

        match update {
            TaskUpdate::Accepted => {
                debug!(id = %owner, "Playback accepted");
                None
            }
            TaskUpdate::Feedback(feedback) => Some(PlaybackSignal::Progress(feedback)),
            TaskUpdate::Completed(result) => {
                Some(PlaybackSignal::Finished(owner, result.was_stopped))
            }
            TaskUpdate::Failed(failure) => Some(PlaybackSignal::Failed(owner, failure)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::select_location;

    #[test]
    fn should_select_location_with_preferred_format() {
        let locations = vec![
            "/tmp/audio/abc.m4a".to_string(),
            "/tmp/audio/abc.WAV".to_string(),
        ];

        assert_eq!(
            select_location(&locations, "wav"),
            Some("/tmp/audio/abc.WAV".to_string())
        );
        assert_eq!(
            select_location(&locations, "m4a"),
            Some("/tmp/audio/abc.m4a".to_string())
        );
    }

    #[test]
    fn should_fall_back_to_first_location() {
        let locations = vec!["/tmp/audio/abc.m4a".to_string()];

        assert_eq!(
            select_location(&locations, "wav"),
            Some("/tmp/audio/abc.m4a".to_string())
        );
    }

    #[test]
    fn should_return_none_without_locations() {
        assert_eq!(select_location(&[], "wav"), None);
    }
}
