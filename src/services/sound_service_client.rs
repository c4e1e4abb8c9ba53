use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sound_pipeline::{
    AnalysisFeedback, AnalysisRequest, AnalysisResult, AnalysisSink, AudioAnalyzer,
    AudioDownloader, CommandError, DispatchError, DownloadFeedback, DownloadRequest,
    DownloadResult, DownloadSink, PlaybackCommand, PlaybackFeedback, PlaybackRequest,
    PlaybackResult, PlaybackSink, SoundPlayer, TaskEventSink,
};
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_POLL_FAILURES: usize = 5;

#[derive(Debug, thiserror::Error)]
pub(crate) enum SoundServiceClientError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy)]
enum GoalKind {
    Download,
    Analysis,
    Playback,
}

impl GoalKind {
    fn path(&self) -> &'static str {
        match self {
            GoalKind::Download => "downloads",
            GoalKind::Analysis => "analyses",
            GoalKind::Playback => "playbacks",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoalResponse {
    goal_id: String,
    accepted: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum GoalStatus {
    Pending,
    Active,
    Succeeded,
    Failed,
}

#[derive(Debug, Deserialize)]
struct GoalState<F, R> {
    status: GoalStatus,
    feedback: Option<F>,
    result: Option<R>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct DownloadFeedbackBody {
    percent: f32,
}

impl From<DownloadFeedbackBody> for DownloadFeedback {
    fn from(body: DownloadFeedbackBody) -> Self {
        DownloadFeedback {
            percent: body.percent,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadResultBody {
    locations: Vec<String>,
}

impl From<DownloadResultBody> for DownloadResult {
    fn from(body: DownloadResultBody) -> Self {
        DownloadResult {
            locations: body.locations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct AnalysisFeedbackBody {
    phase: String,
}

impl From<AnalysisFeedbackBody> for AnalysisFeedback {
    fn from(body: AnalysisFeedbackBody) -> Self {
        AnalysisFeedback { phase: body.phase }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct PlaybackFeedbackBody {
    name: String,
    duration_current: f64,
    duration_total: f64,
    status: PlaybackStatus,
}

impl From<PlaybackFeedbackBody> for PlaybackFeedback {
    fn from(body: PlaybackFeedbackBody) -> Self {
        PlaybackFeedback {
            name: body.name,
            position: Duration::from_secs_f64(body.duration_current.max(0.0)),
            duration: Duration::from_secs_f64(body.duration_total.max(0.0)),
            paused: body.status == PlaybackStatus::Paused,
            stopped: body.status == PlaybackStatus::Stopped,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaybackResultBody {
    was_stopped: bool,
}

impl From<PlaybackResultBody> for PlaybackResult {
    fn from(body: PlaybackResultBody) -> Self {
        PlaybackResult {
            was_stopped: body.was_stopped,
        }
    }
}

/// Follows one accepted goal until it reaches a terminal state.
struct GoalPoller {
    client: Client,
    url: String,
    interval: Duration,
}

impl GoalPoller {
    async fn fetch<FB, RB>(&self) -> Result<GoalState<FB, RB>, reqwest::Error>
    where
        FB: DeserializeOwned,
        RB: DeserializeOwned,
    {
        self.client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    async fn run<FB, RB, F, R>(self, sink: TaskEventSink<F, R>)
    where
        FB: DeserializeOwned + Clone + PartialEq + Into<F>,
        RB: DeserializeOwned + Into<R>,
    {
        let mut last_feedback: Option<FB> = None;
        let mut failures = 0;

        loop {
            actix_rt::time::sleep(self.interval).await;

            let state = match self.fetch::<FB, RB>().await {
                Ok(state) => {
                    failures = 0;
                    state
                }
                Err(error) => {
                    failures += 1;
                    warn!(url = %self.url, ?error, failures, "Unable to poll goal state");

                    if failures >= MAX_POLL_FAILURES {
                        sink.failed(format!("Sound service is unreachable: {}", error));
                        return;
                    }

                    continue;
                }
            };

            if let Some(feedback) = state.feedback {
                if last_feedback.as_ref() != Some(&feedback) {
                    last_feedback = Some(feedback.clone());
                    sink.feedback(feedback.into());
                }
            }

            match state.status {
                GoalStatus::Pending | GoalStatus::Active => (),
                GoalStatus::Succeeded => {
                    match state.result {
                        Some(result) => sink.completed(result.into()),
                        None => sink.failed("Goal has succeeded without a result"),
                    }
                    return;
                }
                GoalStatus::Failed => {
                    sink.failed(state.error.unwrap_or_else(|| "Unknown error".to_string()));
                    return;
                }
            }
        }
    }
}

/// Download, analysis and playback capabilities of the sound file service.
pub(crate) struct SoundServiceClient {
    client: Client,
    endpoint: String,
    poll_interval: Duration,
    dispatch_timeout: Duration,
}

impl SoundServiceClient {
    pub(crate) fn create(
        endpoint: &str,
        poll_interval: Duration,
        timeout: Duration,
        dispatch_timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP Client");

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            poll_interval,
            dispatch_timeout,
        }
    }

    pub(crate) async fn check_connection(&self) -> Result<(), SoundServiceClientError> {
        self.client
            .get(format!("{}/health", self.endpoint))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn dispatch_goal<G, FB, RB, F, R>(
        &self,
        kind: GoalKind,
        goal: &G,
        sink: TaskEventSink<F, R>,
    ) -> Result<(), DispatchError>
    where
        G: Serialize + Sync,
        FB: DeserializeOwned + Clone + PartialEq + Into<F> + 'static,
        RB: DeserializeOwned + Into<R> + 'static,
        F: 'static,
        R: 'static,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, kind.path()))
            .timeout(self.dispatch_timeout)
            .json(goal)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(DispatchError::new)?
            .json::<GoalResponse>()
            .await
            .map_err(DispatchError::new)?;

        if !response.accepted {
            let reason = response
                .reason
                .unwrap_or_else(|| "Goal has been rejected".to_string());
            info!(?kind, goal_id = %response.goal_id, %reason, "Goal rejected");
            sink.rejected(reason);
            return Ok(());
        }

        debug!(?kind, goal_id = %response.goal_id, task_id = %sink.task_id(), "Goal accepted");

        sink.accepted();

        let poller = GoalPoller {
            client: self.client.clone(),
            url: format!("{}/{}/{}", self.endpoint, kind.path(), response.goal_id),
            interval: self.poll_interval,
        };

        actix_rt::spawn(poller.run::<FB, RB, F, R>(sink));

        Ok(())
    }
}

#[async_trait]
impl AudioDownloader for SoundServiceClient {
    async fn request_download(
        &self,
        request: DownloadRequest,
        sink: DownloadSink,
    ) -> Result<(), DispatchError> {
        self.dispatch_goal::<_, DownloadFeedbackBody, DownloadResultBody, _, _>(
            GoalKind::Download,
            &request,
            sink,
        )
        .await
    }
}

#[async_trait]
impl AudioAnalyzer for SoundServiceClient {
    async fn request_analysis(
        &self,
        request: AnalysisRequest,
        sink: AnalysisSink,
    ) -> Result<(), DispatchError> {
        self.dispatch_goal::<_, AnalysisFeedbackBody, AnalysisResult, _, _>(
            GoalKind::Analysis,
            &request,
            sink,
        )
        .await
    }
}

#[async_trait]
impl SoundPlayer for SoundServiceClient {
    async fn request_playback(
        &self,
        request: PlaybackRequest,
        sink: PlaybackSink,
    ) -> Result<(), DispatchError> {
        self.dispatch_goal::<_, PlaybackFeedbackBody, PlaybackResultBody, _, _>(
            GoalKind::Playback,
            &request,
            sink,
        )
        .await
    }

    async fn send_command(&self, command: PlaybackCommand) -> Result<(), CommandError> {
        #[derive(Serialize)]
        struct CommandBody {
            cmd: PlaybackCommand,
        }

        self.client
            .post(format!("{}/playback/commands", self.endpoint))
            .timeout(self.dispatch_timeout)
            .json(&CommandBody { cmd: command })
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(CommandError::new)?;

        Ok(())
    }
}
