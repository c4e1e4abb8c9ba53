use crate::pipeline::orchestrator::{
    EnqueueError, Orchestrator, PipelineDependencies, PipelineError, PipelineSettings,
};
use crate::pipeline::task_handle::TaskEvent;
use crate::pipeline::traits::{
    AnalysisFeedback, DownloadFeedback, DownloadResult, PlaybackFeedback, PlaybackResult,
};
use crate::pipeline::types::{
    AnalysisResult, MediaMetadata, PipelineSnapshot, PipelineUpdate, PlaybackControl,
};
use crate::{MediaId, TaskId};
use std::ops::ControlFlow;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

/// Everything the dispatch loop reacts to, whether it comes from the GUI side or from a
/// remote operation running in the background.
pub enum PipelineEvent {
    Enqueue {
        id: MediaId,
        metadata: MediaMetadata,
        reply: oneshot::Sender<Result<MediaId, EnqueueError>>,
    },
    Command(PlaybackControl),
    Snapshot(oneshot::Sender<PipelineSnapshot>),
    Download(TaskId, TaskEvent<DownloadFeedback, DownloadResult>),
    Analysis(TaskId, TaskEvent<AnalysisFeedback, AnalysisResult>),
    Playback(TaskId, TaskEvent<PlaybackFeedback, PlaybackResult>),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
#[error("Pipeline is not running")]
pub struct PipelineStopped;

/// Cloneable entry point for the GUI collaborator.
#[derive(Clone)]
pub struct PipelineHandle {
    events: UnboundedSender<PipelineEvent>,
}

impl PipelineHandle {
    pub async fn enqueue_item(
        &self,
        id: MediaId,
        metadata: MediaMetadata,
    ) -> Result<MediaId, EnqueueError> {
        let (reply, response) = oneshot::channel();

        self.events
            .send(PipelineEvent::Enqueue {
                id,
                metadata,
                reply,
            })
            .map_err(|_| EnqueueError::PipelineStopped)?;

        response.await.map_err(|_| EnqueueError::PipelineStopped)?
    }

    pub fn issue_playback_command(&self, control: PlaybackControl) -> Result<(), PipelineStopped> {
        self.events
            .send(PipelineEvent::Command(control))
            .map_err(|_| PipelineStopped)
    }

    pub async fn snapshot(&self) -> Result<PipelineSnapshot, PipelineStopped> {
        let (reply, response) = oneshot::channel();

        self.events
            .send(PipelineEvent::Snapshot(reply))
            .map_err(|_| PipelineStopped)?;

        response.await.map_err(|_| PipelineStopped)
    }

    pub fn shutdown(&self) {
        if self.events.send(PipelineEvent::Shutdown).is_err() {
            debug!("Pipeline has already stopped");
        }
    }
}

/// Single consumer of pipeline events. The orchestrator, its stages and the registry are
/// only ever touched from here, one event at a time.
pub struct Dispatcher {
    orchestrator: Orchestrator,
    events: UnboundedReceiver<PipelineEvent>,
}

impl Dispatcher {
    pub async fn run(mut self) -> Result<(), PipelineError> {
        info!("Pipeline dispatch loop started");

        while let Some(event) = self.events.recv().await {
            match self.orchestrator.handle_event(event).await {
                Ok(ControlFlow::Continue(())) => (),
                Ok(ControlFlow::Break(())) => break,
                Err(error) => {
                    error!(?error, "Pipeline invariant violated, stopping dispatch loop");
                    return Err(error);
                }
            }
        }

        info!("Pipeline dispatch loop stopped");

        Ok(())
    }
}

pub struct Pipeline {
    pub handle: PipelineHandle,
    pub dispatcher: Dispatcher,
    pub updates: UnboundedReceiver<PipelineUpdate>,
}

impl Pipeline {
    pub fn create(dependencies: PipelineDependencies, settings: PipelineSettings) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        let (updates_tx, updates_rx) = unbounded_channel();

        let orchestrator = Orchestrator::new(dependencies, settings, events_tx.clone(), updates_tx);

        Self {
            handle: PipelineHandle { events: events_tx },
            dispatcher: Dispatcher {
                orchestrator,
                events: events_rx,
            },
            updates: updates_rx,
        }
    }
}
