use crate::pipeline::traits::{
    AnalysisRequest, AnalysisSink, AudioAnalyzer, AudioDownloader, CommandError, DispatchError,
    DownloadRequest, DownloadSink, PlaybackRequest, PlaybackSink, SoundPlayer,
};
use crate::pipeline::types::PlaybackCommand;
use crate::MediaId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Error, ErrorKind};
use std::sync::Mutex;

fn connection_refused() -> Error {
    Error::new(ErrorKind::ConnectionRefused, "Connection refused")
}

pub(crate) struct DownloaderMock {
    requests: Mutex<Vec<DownloadRequest>>,
    sinks: Mutex<HashMap<MediaId, DownloadSink>>,
    unreachable: Mutex<bool>,
}

impl DownloaderMock {
    pub(crate) fn new() -> Self {
        Self {
            requests: Mutex::new(vec![]),
            sinks: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(false),
        }
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn sink(&self, id: &str) -> DownloadSink {
        self.sinks
            .lock()
            .unwrap()
            .get(&MediaId::from(id))
            .cloned()
            .expect("Download has not been requested")
    }
}

#[async_trait]
impl AudioDownloader for DownloaderMock {
    async fn request_download(
        &self,
        request: DownloadRequest,
        sink: DownloadSink,
    ) -> Result<(), DispatchError> {
        if *self.unreachable.lock().unwrap() {
            return Err(DispatchError::new(connection_refused()));
        }

        self.sinks
            .lock()
            .unwrap()
            .insert(request.media_id.clone(), sink);
        self.requests.lock().unwrap().push(request);

        Ok(())
    }
}

pub(crate) struct AnalyzerMock {
    requests: Mutex<Vec<AnalysisRequest>>,
    sinks: Mutex<HashMap<String, AnalysisSink>>,
    unreachable: Mutex<bool>,
}

impl AnalyzerMock {
    pub(crate) fn new() -> Self {
        Self {
            requests: Mutex::new(vec![]),
            sinks: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(false),
        }
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn sink(&self, location: &str) -> AnalysisSink {
        self.sinks
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .expect("Analysis has not been requested")
    }
}

#[async_trait]
impl AudioAnalyzer for AnalyzerMock {
    async fn request_analysis(
        &self,
        request: AnalysisRequest,
        sink: AnalysisSink,
    ) -> Result<(), DispatchError> {
        if *self.unreachable.lock().unwrap() {
            return Err(DispatchError::new(connection_refused()));
        }

        self.sinks
            .lock()
            .unwrap()
            .insert(request.location.clone(), sink);
        self.requests.lock().unwrap().push(request);

        Ok(())
    }
}

pub(crate) struct PlayerMock {
    requests: Mutex<Vec<PlaybackRequest>>,
    sinks: Mutex<HashMap<String, PlaybackSink>>,
    commands: Mutex<Vec<PlaybackCommand>>,
    unreachable: Mutex<bool>,
    commands_unreachable: Mutex<bool>,
}

impl PlayerMock {
    pub(crate) fn new() -> Self {
        Self {
            requests: Mutex::new(vec![]),
            sinks: Mutex::new(HashMap::new()),
            commands: Mutex::new(vec![]),
            unreachable: Mutex::new(false),
            commands_unreachable: Mutex::new(false),
        }
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn set_commands_unreachable(&self, unreachable: bool) {
        *self.commands_unreachable.lock().unwrap() = unreachable;
    }

    pub(crate) fn requested_locations(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.location.clone())
            .collect()
    }

    pub(crate) fn commands(&self) -> Vec<PlaybackCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn sink(&self, location: &str) -> PlaybackSink {
        self.sinks
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .expect("Playback has not been requested")
    }
}

#[async_trait]
impl SoundPlayer for PlayerMock {
    async fn request_playback(
        &self,
        request: PlaybackRequest,
        sink: PlaybackSink,
    ) -> Result<(), DispatchError> {
        if *self.unreachable.lock().unwrap() {
            return Err(DispatchError::new(connection_refused()));
        }

        self.sinks
            .lock()
            .unwrap()
            .insert(request.location.clone(), sink);
        self.requests.lock().unwrap().push(request);

        Ok(())
    }

    async fn send_command(&self, command: PlaybackCommand) -> Result<(), CommandError> {
        if *self.commands_unreachable.lock().unwrap() {
            return Err(CommandError::new(connection_refused()));
        }

        self.commands.lock().unwrap().push(command);

        Ok(())
    }
}
