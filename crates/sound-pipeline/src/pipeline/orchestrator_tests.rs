use super::dispatch::{Pipeline, PipelineEvent};
use super::mocks::{AnalyzerMock, DownloaderMock, PlayerMock};
use super::orchestrator::{EnqueueError, Orchestrator, PipelineDependencies, PipelineSettings};
use super::traits::{DownloadFeedback, DownloadResult, PlaybackFeedback, PlaybackResult};
use super::types::{
    AnalysisResult, MediaMetadata, MediaStage, PipelineUpdate, PlaybackCommand, PlaybackControl,
    PlayerState, RemovalReason, StageFailure, TaskKind,
};
use crate::MediaId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

struct Harness {
    orchestrator: Orchestrator,
    events: UnboundedReceiver<PipelineEvent>,
    updates: UnboundedReceiver<PipelineUpdate>,
    downloader: Arc<DownloaderMock>,
    analyzer: Arc<AnalyzerMock>,
    player: Arc<PlayerMock>,
}

fn location(id: &str) -> String {
    format!("/tmp/audio/{}.wav", id)
}

fn metadata(title: &str) -> MediaMetadata {
    MediaMetadata {
        title: title.to_string(),
        author: "Test Author".to_string(),
        duration: Some("3:00".to_string()),
        ..MediaMetadata::default()
    }
}

impl Harness {
    fn new() -> Self {
        let downloader = Arc::new(DownloaderMock::new());
        let analyzer = Arc::new(AnalyzerMock::new());
        let player = Arc::new(PlayerMock::new());

        let (events_tx, events) = unbounded_channel();
        let (updates_tx, updates) = unbounded_channel();

        let orchestrator = Orchestrator::new(
            PipelineDependencies {
                downloader: downloader.clone(),
                analyzer: analyzer.clone(),
                player: player.clone(),
            },
            PipelineSettings::default(),
            events_tx,
            updates_tx,
        );

        Self {
            orchestrator,
            events,
            updates,
            downloader,
            analyzer,
            player,
        }
    }

    /// Feeds every pending task event to the orchestrator, the way the dispatch loop would.
    async fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.orchestrator
                .handle_event(event)
                .await
                .expect("Pipeline invariant violated");
        }
    }

    fn drain_updates(&mut self) -> Vec<PipelineUpdate> {
        let mut updates = vec![];
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }

    async fn enqueue(&mut self, id: &str) -> Result<MediaId, EnqueueError> {
        self.orchestrator.enqueue_item(id.into(), metadata(id)).await
    }

    async fn command(&mut self, control: PlaybackControl) {
        self.orchestrator
            .issue_playback_command(control)
            .await
            .expect("Pipeline invariant violated");
        self.pump().await;
    }

    async fn complete_download(&mut self, id: &str) {
        let sink = self.downloader.sink(id);
        sink.accepted();
        sink.feedback(DownloadFeedback { percent: 50.0 });
        sink.completed(DownloadResult {
            locations: vec![format!("/tmp/audio/{}.m4a", id), location(id)],
        });
        self.pump().await;
    }

    async fn complete_analysis(&mut self, id: &str) {
        let sink = self.analyzer.sink(&location(id));
        sink.accepted();
        sink.completed(AnalysisResult {
            tempo_bpm: 120.0,
            beats: vec![0.5, 1.0],
            onsets: vec![0.1],
        });
        self.pump().await;
    }

    async fn make_ready(&mut self, id: &str) {
        self.enqueue(id).await.unwrap();
        self.complete_download(id).await;
        self.complete_analysis(id).await;
    }

    async fn report_position(&mut self, id: &str, paused: bool) {
        self.report_feedback(id, paused, false).await;
    }

    async fn report_feedback(&mut self, id: &str, paused: bool, stopped: bool) {
        self.player.sink(&location(id)).feedback(PlaybackFeedback {
            name: id.to_string(),
            position: Duration::from_secs(65),
            duration: Duration::from_secs(180),
            paused,
            stopped,
        });
        self.pump().await;
    }

    async fn finish_playback(&mut self, id: &str, was_stopped: bool) {
        self.player
            .sink(&location(id))
            .completed(PlaybackResult { was_stopped });
        self.pump().await;
    }

    fn stage(&self, id: &str) -> Option<MediaStage> {
        self.orchestrator
            .registry()
            .get(&id.into())
            .map(|item| item.stage())
    }

    fn playing(&self) -> Option<String> {
        self.orchestrator
            .registry()
            .playing()
            .map(|item| item.id().to_string())
    }

    fn queued_ids(&self) -> Vec<String> {
        self.orchestrator
            .registry()
            .iter()
            .map(|item| item.id().to_string())
            .collect()
    }
}

fn removals(updates: &[PipelineUpdate]) -> Vec<(String, RemovalReason)> {
    updates
        .iter()
        .filter_map(|update| match update {
            PipelineUpdate::ItemRemoved { id, reason } => Some((id.to_string(), reason.clone())),
            _ => None,
        })
        .collect()
}

#[actix_rt::test]
async fn test_item_goes_through_all_stages() {
    let mut harness = Harness::new();

    let id = harness.enqueue("a").await.unwrap();

    assert_eq!(id, MediaId::from("a"));
    assert_eq!(harness.stage("a"), Some(MediaStage::Downloading));

    let requests = harness.downloader.requests();
    assert_eq!(requests[0].quality, 320);
    assert_eq!(requests[0].file_formats, vec!["m4a", "wav"]);

    harness.complete_download("a").await;

    assert_eq!(harness.stage("a"), Some(MediaStage::Analyzing));
    assert_eq!(
        harness.orchestrator.registry().get(&"a".into()).unwrap().local_location(),
        Some(location("a").as_str())
    );
    assert_eq!(harness.analyzer.requests()[0].location, location("a"));

    harness.complete_analysis("a").await;

    assert_eq!(harness.stage("a"), Some(MediaStage::Playing));
    assert_eq!(harness.player.requested_locations(), vec![location("a")]);
    assert!(harness.orchestrator.player_state().active);

    harness.finish_playback("a", false).await;

    assert!(harness.orchestrator.registry().is_empty());
    assert!(!harness.orchestrator.player_state().active);

    let updates = harness.drain_updates();
    assert!(updates.contains(&PipelineUpdate::ItemQueued {
        id: "a".into(),
        metadata: metadata("a"),
    }));
    assert!(updates.contains(&PipelineUpdate::DownloadProgress {
        id: "a".into(),
        percent: 50.0,
    }));
    assert!(updates.contains(&PipelineUpdate::PlaybackStarting { id: "a".into() }));
    assert_eq!(
        removals(&updates),
        vec![("a".to_string(), RemovalReason::Finished)]
    );
}

#[actix_rt::test]
async fn test_later_item_waits_for_earlier_one() {
    let mut harness = Harness::new();

    harness.enqueue("a").await.unwrap();
    harness.enqueue("b").await.unwrap();

    harness.complete_download("b").await;
    harness.complete_analysis("b").await;

    assert_eq!(harness.stage("b"), Some(MediaStage::Ready));
    assert_eq!(harness.playing(), None);
    assert!(harness.player.requested_locations().is_empty());

    harness.complete_download("a").await;
    harness.complete_analysis("a").await;

    assert_eq!(harness.playing(), Some("a".to_string()));
    assert_eq!(harness.stage("b"), Some(MediaStage::Ready));

    harness.finish_playback("a", false).await;

    assert_eq!(harness.playing(), Some("b".to_string()));
    assert_eq!(
        harness.player.requested_locations(),
        vec![location("a"), location("b")]
    );
}

#[actix_rt::test]
async fn test_only_one_item_is_playing() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;
    harness.make_ready("c").await;

    assert_eq!(
        harness
            .orchestrator
            .registry()
            .count_in_stage(MediaStage::Playing),
        1
    );
    assert_eq!(
        harness
            .orchestrator
            .registry()
            .count_in_stage(MediaStage::Ready),
        2
    );
    assert_eq!(harness.player.requested_locations(), vec![location("a")]);
}

#[actix_rt::test]
async fn test_items_play_in_enqueue_order() {
    let mut harness = Harness::new();

    for id in ["c", "a", "b"] {
        harness.enqueue(id).await.unwrap();
    }
    for id in ["b", "a", "c"] {
        harness.complete_download(id).await;
    }
    for id in ["a", "b", "c"] {
        harness.complete_analysis(id).await;
    }

    let mut played = vec![];
    while let Some(id) = harness.playing() {
        played.push(id.clone());
        harness.finish_playback(&id, false).await;
    }

    assert_eq!(played, vec!["c", "a", "b"]);
    assert!(harness.orchestrator.registry().is_empty());
}

#[actix_rt::test]
async fn test_unreachable_downloader_leaves_registry_untouched() {
    let mut harness = Harness::new();
    harness.downloader.set_unreachable(true);

    let result = harness.enqueue("a").await;

    assert!(matches!(result, Err(EnqueueError::DispatchFailed(_))));
    assert!(harness.orchestrator.registry().is_empty());
    assert!(harness.drain_updates().is_empty());

    harness.downloader.set_unreachable(false);

    assert!(harness.enqueue("a").await.is_ok());
    assert_eq!(harness.queued_ids(), vec!["a"]);
}

#[actix_rt::test]
async fn test_refuse_duplicate_item() {
    let mut harness = Harness::new();

    harness.enqueue("a").await.unwrap();
    let result = harness.enqueue("a").await;

    assert!(matches!(result, Err(EnqueueError::AlreadyQueued(id)) if id == MediaId::from("a")));
    assert_eq!(harness.queued_ids(), vec!["a"]);
    assert_eq!(harness.downloader.requests().len(), 1);
}

#[actix_rt::test]
async fn test_rejected_download_removes_item() {
    let mut harness = Harness::new();

    harness.enqueue("a").await.unwrap();
    harness.downloader.sink("a").rejected("Too many downloads");
    harness.pump().await;

    assert!(harness.orchestrator.registry().is_empty());
    assert_eq!(
        removals(&harness.drain_updates()),
        vec![(
            "a".to_string(),
            RemovalReason::Failed {
                stage: TaskKind::Download,
                failure: StageFailure::Rejected("Too many downloads".to_string()),
            }
        )]
    );
}

#[actix_rt::test]
async fn test_download_without_files_removes_item() {
    let mut harness = Harness::new();

    harness.enqueue("a").await.unwrap();
    harness
        .downloader
        .sink("a")
        .completed(DownloadResult { locations: vec![] });
    harness.pump().await;

    assert!(harness.orchestrator.registry().is_empty());
    assert!(harness.analyzer.requests().is_empty());
}

#[actix_rt::test]
async fn test_unreachable_analyzer_removes_item() {
    let mut harness = Harness::new();
    harness.analyzer.set_unreachable(true);

    harness.enqueue("a").await.unwrap();
    harness.complete_download("a").await;

    assert!(harness.orchestrator.registry().is_empty());

    let removed = removals(&harness.drain_updates());
    assert_eq!(removed.len(), 1);
    assert!(matches!(
        &removed[0].1,
        RemovalReason::Failed {
            stage: TaskKind::Analyze,
            failure: StageFailure::Unreachable(_),
        }
    ));
}

#[actix_rt::test]
async fn test_failed_head_unblocks_ready_item() {
    let mut harness = Harness::new();

    harness.enqueue("a").await.unwrap();
    harness.make_ready("b").await;

    assert_eq!(harness.playing(), None);

    harness.downloader.sink("a").failed("Video is unavailable");
    harness.pump().await;

    assert_eq!(harness.queued_ids(), vec!["b"]);
    assert_eq!(harness.playing(), Some("b".to_string()));
}

#[actix_rt::test]
async fn test_unreachable_player_drops_items_until_queue_is_empty() {
    let mut harness = Harness::new();

    harness.enqueue("a").await.unwrap();
    harness.make_ready("b").await;

    harness.player.set_unreachable(true);

    harness.complete_download("a").await;
    harness.complete_analysis("a").await;

    assert!(harness.orchestrator.registry().is_empty());
    assert!(!harness.orchestrator.player_state().active);
    assert_eq!(
        removals(&harness.drain_updates())
            .into_iter()
            .map(|(id, _)| id)
            .collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

#[actix_rt::test]
async fn test_failed_playback_starts_next_item() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;

    harness.player.sink(&location("a")).failed("Audio device lost");
    harness.pump().await;

    assert_eq!(harness.queued_ids(), vec!["b"]);
    assert_eq!(harness.playing(), Some("b".to_string()));
}

#[actix_rt::test]
async fn test_duplicate_terminal_events_are_ignored() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;

    let sink = harness.player.sink(&location("a"));
    sink.completed(PlaybackResult { was_stopped: false });
    sink.completed(PlaybackResult { was_stopped: false });
    sink.failed("Late failure");
    harness.pump().await;

    assert_eq!(harness.queued_ids(), vec!["b"]);
    assert_eq!(harness.playing(), Some("b".to_string()));

    let download = harness.downloader.sink("b");
    download.completed(DownloadResult {
        locations: vec![location("b")],
    });
    harness.pump().await;

    assert_eq!(harness.stage("b"), Some(MediaStage::Playing));
    assert_eq!(removals(&harness.drain_updates()).len(), 1);
}

#[actix_rt::test]
async fn test_toggle_is_resolved_from_player_state() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;

    harness.command(PlaybackControl::Toggle).await;

    assert!(harness.orchestrator.player_state().paused);

    harness.report_position("a", true).await;
    harness.command(PlaybackControl::Toggle).await;

    assert!(!harness.orchestrator.player_state().paused);
    assert_eq!(
        harness.player.commands(),
        vec![PlaybackCommand::Pause, PlaybackCommand::Resume]
    );
}

#[actix_rt::test]
async fn test_toggle_after_stop_resumes() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;

    harness.command(PlaybackControl::Stop).await;

    assert!(!harness.orchestrator.player_state().active);

    harness.report_position("a", false).await;

    assert!(!harness.orchestrator.player_state().active);

    harness.command(PlaybackControl::Toggle).await;

    assert_eq!(
        harness.player.commands(),
        vec![PlaybackCommand::Stop, PlaybackCommand::Resume]
    );
    assert!(harness.orchestrator.player_state().active);
    assert!(!harness.orchestrator.player_state().paused);

    harness.finish_playback("a", true).await;

    assert_eq!(harness.playing(), Some("b".to_string()));
    assert!(!harness.orchestrator.player_state().stopped_by_user);
}

#[actix_rt::test]
async fn test_stopped_feedback_resolves_toggle_to_resume() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.drain_updates();

    harness.report_feedback("a", false, true).await;

    assert_eq!(
        harness.drain_updates(),
        vec![PipelineUpdate::PlaybackProgress {
            position: Duration::from_secs(65),
            duration: Duration::from_secs(180),
            paused: false,
            active: false,
        }]
    );

    harness.command(PlaybackControl::Toggle).await;

    assert_eq!(harness.player.commands(), vec![PlaybackCommand::Resume]);
    assert!(harness.orchestrator.player_state().active);
}

#[actix_rt::test]
async fn test_toggle_without_playback_starts_next_item() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.command(PlaybackControl::Stop).await;
    harness.finish_playback("a", true).await;
    harness.make_ready("b").await;

    assert_eq!(harness.playing(), None);

    harness.command(PlaybackControl::Toggle).await;

    assert_eq!(harness.playing(), Some("b".to_string()));
    assert_eq!(harness.player.commands(), vec![PlaybackCommand::Stop]);
}

#[actix_rt::test]
async fn test_stop_suspends_auto_advance_until_resumed() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;

    harness.command(PlaybackControl::Stop).await;
    harness.finish_playback("a", true).await;

    assert_eq!(harness.queued_ids(), vec!["b"]);
    assert_eq!(harness.playing(), None);
    assert!(harness.orchestrator.player_state().stopped_by_user);
    assert_eq!(
        removals(&harness.drain_updates()),
        vec![("a".to_string(), RemovalReason::Stopped)]
    );

    harness.make_ready("c").await;

    assert_eq!(harness.playing(), None);

    harness.command(PlaybackControl::Resume).await;

    assert_eq!(harness.playing(), Some("b".to_string()));
    assert!(!harness.orchestrator.player_state().stopped_by_user);
}

#[actix_rt::test]
async fn test_skip_advances_to_next_item() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;

    harness.command(PlaybackControl::Skip).await;
    harness.finish_playback("a", true).await;

    assert_eq!(harness.playing(), Some("b".to_string()));
    assert_eq!(harness.player.commands(), vec![PlaybackCommand::Skip]);
    assert!(!harness.orchestrator.player_state().stopped_by_user);
}

#[actix_rt::test]
async fn test_skip_then_natural_finish_advances() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.make_ready("b").await;

    harness.command(PlaybackControl::Skip).await;
    harness.finish_playback("a", false).await;

    assert_eq!(harness.playing(), Some("b".to_string()));
    assert_eq!(harness.player.commands(), vec![PlaybackCommand::Skip]);
    assert!(!harness.orchestrator.player_state().stopped_by_user);
    assert_eq!(
        removals(&harness.drain_updates()),
        vec![("a".to_string(), RemovalReason::Finished)]
    );
}

#[actix_rt::test]
async fn test_pause_and_stop_without_playback_are_ignored() {
    let mut harness = Harness::new();

    harness.command(PlaybackControl::Pause).await;
    harness.command(PlaybackControl::Stop).await;

    assert!(harness.player.commands().is_empty());
    assert_eq!(harness.orchestrator.player_state(), PlayerState::default());
}

#[actix_rt::test]
async fn test_failed_command_is_reported() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.drain_updates();
    harness.player.set_commands_unreachable(true);

    harness.command(PlaybackControl::Pause).await;

    assert!(!harness.orchestrator.player_state().paused);
    assert_eq!(harness.playing(), Some("a".to_string()));
    assert!(matches!(
        harness.drain_updates().as_slice(),
        [PipelineUpdate::CommandFailed {
            command: PlaybackCommand::Pause,
            ..
        }]
    ));
}

#[actix_rt::test]
async fn test_playback_progress_is_tracked() {
    let mut harness = Harness::new();

    harness.make_ready("a").await;
    harness.drain_updates();

    harness.report_position("a", false).await;

    assert_eq!(
        harness.drain_updates(),
        vec![PipelineUpdate::PlaybackProgress {
            position: Duration::from_secs(65),
            duration: Duration::from_secs(180),
            paused: false,
            active: true,
        }]
    );
    assert_eq!(
        harness.orchestrator.snapshot().progress,
        Some((Duration::from_secs(65), Duration::from_secs(180)))
    );
}

#[actix_rt::test]
async fn test_pipeline_handle_talks_to_dispatch_loop() {
    let Pipeline {
        handle,
        dispatcher,
        mut updates,
    } = Pipeline::create(
        PipelineDependencies {
            downloader: Arc::new(DownloaderMock::new()),
            analyzer: Arc::new(AnalyzerMock::new()),
            player: Arc::new(PlayerMock::new()),
        },
        PipelineSettings::default(),
    );

    let running = actix_rt::spawn(dispatcher.run());

    let id = handle.enqueue_item("a".into(), metadata("a")).await.unwrap();
    assert_eq!(id, MediaId::from("a"));

    assert!(matches!(
        handle.enqueue_item("a".into(), metadata("a")).await,
        Err(EnqueueError::AlreadyQueued(_))
    ));

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.items.len(), 1);
    assert_eq!(snapshot.items[0].stage(), MediaStage::Downloading);
    assert_eq!(snapshot.player_state, PlayerState::default());

    assert!(matches!(
        updates.recv().await,
        Some(PipelineUpdate::ItemQueued { .. })
    ));

    handle.shutdown();

    assert!(running.await.unwrap().is_ok());
    assert!(matches!(
        handle.enqueue_item("b".into(), metadata("b")).await,
        Err(EnqueueError::PipelineStopped)
    ));
    assert!(handle.snapshot().await.is_err());

    handle.shutdown();
}
