use crate::pipeline::dispatch::PipelineEvent;
use crate::pipeline::registry::MediaRegistry;
use crate::pipeline::stages::{
    AnalysisSettings, AnalysisStage, DownloadSettings, DownloadStage, PlaybackBeginError,
    PlaybackSignal, PlaybackStage, StageSignal,
};
use crate::pipeline::traits::{AudioAnalyzer, AudioDownloader, DispatchError, SoundPlayer};
use crate::pipeline::types::{
    MediaItem, MediaMetadata, MediaStage, PipelineSnapshot, PipelineUpdate, PlaybackCommand,
    PlaybackControl, PlayerState, RemovalReason, StageFailure, TaskKind,
};
use crate::MediaId;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

/// Internal invariant violations. Any of these means the orchestrator itself is broken.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Playback was requested while {0} is still playing")]
    PlaybackAlreadyActive(MediaId),
    #[error("Item {id} can not move from {from:?} to {to:?}")]
    InvalidTransition {
        id: MediaId,
        from: MediaStage,
        to: MediaStage,
    },
    #[error("Item {0} has not been found in the registry")]
    ItemNotFound(MediaId),
    #[error("Item {0} reached {1:?} without the data it requires")]
    MissingStageData(MediaId, MediaStage),
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    #[error(transparent)]
    DispatchFailed(#[from] DispatchError),
    #[error("Item {0} is already queued")]
    AlreadyQueued(MediaId),
    #[error("Pipeline is not running")]
    PipelineStopped,
}

pub struct PipelineDependencies {
    pub downloader: Arc<dyn AudioDownloader + Send + Sync>,
    pub analyzer: Arc<dyn AudioAnalyzer + Send + Sync>,
    pub player: Arc<dyn SoundPlayer + Send + Sync>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSettings {
    pub download: DownloadSettings,
    pub analysis: AnalysisSettings,
}

pub struct Orchestrator {
    registry: MediaRegistry,
    player_state: PlayerState,
    continuation_requested: bool,
    stop_requested: bool,
    download: DownloadStage,
    analysis: AnalysisStage,
    playback: PlaybackStage,
    updates: UnboundedSender<PipelineUpdate>,
}

impl Orchestrator {
    pub(crate) fn new(
        dependencies: PipelineDependencies,
        settings: PipelineSettings,
        events: UnboundedSender<PipelineEvent>,
        updates: UnboundedSender<PipelineUpdate>,
    ) -> Self {
        let PipelineDependencies {
            downloader,
            analyzer,
            player,
        } = dependencies;

        Self {
            registry: MediaRegistry::new(),
            player_state: PlayerState::default(),
            continuation_requested: false,
            stop_requested: false,
            download: DownloadStage::new(downloader, settings.download, events.clone()),
            analysis: AnalysisStage::new(analyzer, settings.analysis, events.clone()),
            playback: PlaybackStage::new(player, events),
            updates,
        }
    }

    pub fn registry(&self) -> &MediaRegistry {
        &self.registry
    }

    pub fn player_state(&self) -> PlayerState {
        self.player_state
    }

    pub(crate) fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            items: self.registry.snapshot(),
            player_state: self.player_state,
            progress: self
                .playback
                .last_feedback()
                .map(|feedback| (feedback.position, feedback.duration)),
        }
    }

    pub(crate) async fn handle_event(
        &mut self,
        event: PipelineEvent,
    ) -> Result<ControlFlow<()>, PipelineError> {
        match event {
            PipelineEvent::Enqueue {
                id,
                metadata,
                reply,
            } => {
                let result = self.enqueue_item(id, metadata).await;
                if reply.send(result).is_err() {
                    debug!("Enqueue caller is gone before receiving the result");
                }
            }
            PipelineEvent::Command(control) => {
                self.issue_playback_command(control).await?;
            }
            PipelineEvent::Snapshot(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot caller is gone before receiving the result");
                }
            }
            PipelineEvent::Download(task_id, event) => {
                let signal = self.download.on_event(&mut self.registry, task_id, event)?;
                match signal {
                    Some(StageSignal::Progress(id, percent)) => {
                        debug!(%id, percent, "Download progress");
                        self.notify(PipelineUpdate::DownloadProgress { id, percent });
                    }
                    Some(StageSignal::Advanced(id)) => self.on_download_complete(&id).await?,
                    Some(StageSignal::Failed(id, failure)) => {
                        self.drop_item(&id, TaskKind::Download, failure);
                        self.maybe_start_next_playback().await?;
                    }
                    None => (),
                }
            }
            PipelineEvent::Analysis(task_id, event) => {
                let signal = self.analysis.on_event(&mut self.registry, task_id, event)?;
                match signal {
                    Some(StageSignal::Progress(id, phase)) => {
                        debug!(%id, %phase, "Analysis progress");
                        self.notify(PipelineUpdate::AnalysisProgress { id, phase });
                    }
                    Some(StageSignal::Advanced(id)) => self.on_analysis_complete(&id).await?,
                    Some(StageSignal::Failed(id, failure)) => {
                        self.drop_item(&id, TaskKind::Analyze, failure);
                        self.maybe_start_next_playback().await?;
                    }
                    None => (),
                }
            }
            PipelineEvent::Playback(task_id, event) => match self.playback.on_event(task_id, event) {
                Some(PlaybackSignal::Progress(feedback)) => {
                    let active = !(feedback.stopped || self.stop_requested);
                    self.player_state.active = active;
                    self.player_state.paused = active && feedback.paused;
                    self.notify(PipelineUpdate::PlaybackProgress {
                        position: feedback.position,
                        duration: feedback.duration,
                        paused: self.player_state.paused,
                        active,
                    });
                }
                Some(PlaybackSignal::Finished(id, was_stopped)) => {
                    self.on_playback_finished(&id, was_stopped).await?;
                }
                Some(PlaybackSignal::Failed(id, failure)) => {
                    self.drop_item(&id, TaskKind::Play, failure);
                    self.release_player(false);
                    self.maybe_start_next_playback().await?;
                }
                None => (),
            },
            PipelineEvent::Shutdown => {
                self.shutdown().await;
                return Ok(ControlFlow::Break(()));
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    /// Starts downloading a new item. Nothing is registered unless the download was dispatched.
    pub(crate) async fn enqueue_item(
        &mut self,
        id: MediaId,
        metadata: MediaMetadata,
    ) -> Result<MediaId, EnqueueError> {
        if self.registry.contains(&id) {
            warn!(%id, "Item is already queued");
            return Err(EnqueueError::AlreadyQueued(id));
        }

        let mut item = MediaItem::new(id.clone(), metadata.clone());

        if let Err(error) = self.download.begin(&item).await {
            error!(%id, ?error, "Failed to send audio download request");
            return Err(EnqueueError::DispatchFailed(error));
        }

        item.stage = MediaStage::Downloading;
        self.registry.insert(item);

        info!(
            %id,
            queued = self.registry.len(),
            downloads = self.download.in_flight(),
            analyses = self.analysis.in_flight(),
            "Item queued"
        );

        self.notify(PipelineUpdate::ItemQueued {
            id: id.clone(),
            metadata,
        });

        Ok(id)
    }

    async fn on_download_complete(&mut self, id: &MediaId) -> Result<(), PipelineError> {
        let item = self
            .registry
            .get(id)
            .ok_or_else(|| PipelineError::ItemNotFound(id.clone()))?;
        let location = item
            .local_location()
            .ok_or_else(|| PipelineError::MissingStageData(id.clone(), item.stage()))?
            .to_string();

        match self.analysis.begin(id, &location).await {
            Ok(()) => {
                self.item_mut(id)?.advance(MediaStage::Analyzing)?;
            }
            Err(error) => {
                error!(%id, ?error, "Failed to send audio analysis request");
                self.drop_item(
                    id,
                    TaskKind::Analyze,
                    StageFailure::Unreachable(error.to_string()),
                );
                self.maybe_start_next_playback().await?;
            }
        }

        Ok(())
    }

    async fn on_analysis_complete(&mut self, id: &MediaId) -> Result<(), PipelineError> {
        info!(%id, "Item is ready for playback");

        self.maybe_start_next_playback().await
    }

    /// The only place where playback is started.
    ///
    /// Waits for the oldest queued item: a later item that became ready first does not jump
    /// the queue. Items whose playback can not be dispatched are dropped and the next one is
    /// tried.
    async fn maybe_start_next_playback(&mut self) -> Result<(), PipelineError> {
        loop {
            if self.player_state.stopped_by_user {
                debug!("Auto-advance is suspended until playback is resumed");
                return Ok(());
            }

            if self.playback.is_active() || self.registry.playing().is_some() {
                return Ok(());
            }

            let next = match self.registry.head() {
                Some(next) => next,
                None => {
                    debug!("Nothing left to play");
                    return Ok(());
                }
            };

            if next.stage() != MediaStage::Ready {
                debug!(id = %next.id(), stage = ?next.stage(), "Next item is not ready yet");
                return Ok(());
            }

            let id = next.id().clone();
            let location = next
                .local_location()
                .ok_or_else(|| PipelineError::MissingStageData(id.clone(), MediaStage::Ready))?
                .to_string();
            let characteristics = next
                .analysis_result()
                .cloned()
                .ok_or_else(|| PipelineError::MissingStageData(id.clone(), MediaStage::Ready))?;

            self.item_mut(&id)?.advance(MediaStage::Playing)?;

            match self.playback.begin(&id, &location, &characteristics).await {
                Ok(()) => {
                    self.player_state = PlayerState {
                        active: true,
                        paused: false,
                        stopped_by_user: false,
                    };
                    self.continuation_requested = false;
                    self.stop_requested = false;
                    info!(%id, "Playback starting");
                    self.notify(PipelineUpdate::PlaybackStarting { id });
                    return Ok(());
                }
                Err(PlaybackBeginError::Dispatch(error)) => {
                    error!(%id, ?error, "Failed to send playback request");
                    self.drop_item(
                        &id,
                        TaskKind::Play,
                        StageFailure::Unreachable(error.to_string()),
                    );
                }
                Err(PlaybackBeginError::AlreadyActive(playing)) => {
                    return Err(PipelineError::PlaybackAlreadyActive(playing));
                }
            }
        }
    }

    async fn on_playback_finished(
        &mut self,
        id: &MediaId,
        was_stopped: bool,
    ) -> Result<(), PipelineError> {
        let stopped_by_user = was_stopped && !self.continuation_requested;

        info!(%id, was_stopped, stopped_by_user, "Playback finished");

        if self.registry.remove(id).is_some() {
            let reason = if was_stopped {
                RemovalReason::Stopped
            } else {
                RemovalReason::Finished
            };
            self.notify(PipelineUpdate::ItemRemoved {
                id: id.clone(),
                reason,
            });
        } else {
            warn!(%id, "Finished item is not in the registry anymore");
        }

        self.release_player(stopped_by_user);

        self.maybe_start_next_playback().await
    }

    pub(crate) async fn issue_playback_command(
        &mut self,
        control: PlaybackControl,
    ) -> Result<(), PipelineError> {
        let command = control.resolve(&self.player_state);
        let playing = self.playback.active_owner().cloned();

        info!(?control, %command, ?playing, "Playback command issued");

        match (command, playing.is_some()) {
            (PlaybackCommand::Pause, true) => {
                if self.forward_command(command).await {
                    self.player_state.paused = true;
                }
            }
            (PlaybackCommand::Resume, true) => {
                if self.forward_command(command).await {
                    if self.stop_requested {
                        self.stop_requested = false;
                        self.continuation_requested = true;
                    }
                    self.player_state.active = true;
                    self.player_state.paused = false;
                }
            }
            (PlaybackCommand::Stop, true) => {
                self.continuation_requested = false;
                if self.forward_command(command).await {
                    // Stopping until the playback result arrives.
                    self.stop_requested = true;
                    self.player_state.active = false;
                    self.player_state.paused = false;
                }
            }
            (PlaybackCommand::Skip, true) => {
                self.player_state.stopped_by_user = false;
                self.continuation_requested = true;
                self.forward_command(command).await;
            }
            (PlaybackCommand::Resume, false) | (PlaybackCommand::Skip, false) => {
                self.player_state.stopped_by_user = false;
                self.maybe_start_next_playback().await?;
            }
            (PlaybackCommand::Pause, false) | (PlaybackCommand::Stop, false) => {
                debug!(%command, "Nothing is playing, command ignored");
            }
        }

        Ok(())
    }

    async fn forward_command(&mut self, command: PlaybackCommand) -> bool {
        match self.playback.send_command(command).await {
            Ok(()) => true,
            Err(error) => {
                error!(%command, ?error, "Error sending sound playback command");
                self.notify(PipelineUpdate::CommandFailed {
                    command,
                    reason: error.to_string(),
                });
                false
            }
        }
    }

    fn release_player(&mut self, stopped_by_user: bool) {
        self.player_state = PlayerState {
            active: false,
            paused: false,
            stopped_by_user,
        };
        self.continuation_requested = false;
        self.stop_requested = false;
        self.notify(PipelineUpdate::PlaybackProgress {
            position: Duration::ZERO,
            duration: Duration::ZERO,
            paused: false,
            active: false,
        });
    }

    fn drop_item(&mut self, id: &MediaId, stage: TaskKind, failure: StageFailure) {
        match self.registry.remove(id) {
            Some(_) => {
                warn!(%id, ?stage, %failure, "Item dropped from the queue");
                self.notify(PipelineUpdate::ItemRemoved {
                    id: id.clone(),
                    reason: RemovalReason::Failed { stage, failure },
                });
            }
            None => debug!(%id, "Failed item has already been removed"),
        }
    }

    async fn shutdown(&mut self) {
        info!(queued = self.registry.len(), "Pipeline is shutting down");

        if self.playback.is_active() {
            self.forward_command(PlaybackCommand::Stop).await;
        }
    }

    fn item_mut(&mut self, id: &MediaId) -> Result<&mut MediaItem, PipelineError> {
        self.registry
            .get_mut(id)
            .ok_or_else(|| PipelineError::ItemNotFound(id.clone()))
    }

    fn notify(&self, update: PipelineUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Nobody is listening to pipeline updates");
        }
    }
}
