use serde::de::DeserializeOwned;
use serde::Deserialize;
use sound_pipeline::{
    AnalysisSettings, DownloadSettings, OnsetAlgorithm, PipelineSettings, RhythmAlgorithm,
    WindowAlgorithm,
};
use std::time::Duration;

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30u64
}

fn default_playback_file_format() -> String {
    "wav".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500u64
}

fn default_request_timeout_ms() -> u64 {
    5000u64
}

fn default_dispatch_timeout_ms() -> u64 {
    2000u64
}

fn default_download_quality() -> u32 {
    320u32
}

fn default_download_file_formats() -> Vec<String> {
    vec!["m4a".to_string(), "wav".to_string()]
}

fn default_onset_algorithm() -> OnsetAlgorithm {
    OnsetAlgorithm::Hfc
}

fn default_rhythm_algorithm() -> RhythmAlgorithm {
    RhythmAlgorithm::Multifeature
}

fn default_window_algorithm() -> WindowAlgorithm {
    WindowAlgorithm::Hamming
}

fn default_search_results_limit() -> usize {
    10usize
}

/// `SOUND_SERVICE_*`
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SoundServiceConfig {
    pub(crate) endpoint: String,
    #[serde(default = "default_poll_interval_ms")]
    pub(crate) poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub(crate) request_timeout_ms: u64,
    /// Goal and command requests are awaited by the dispatch loop, so they get a shorter limit.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub(crate) dispatch_timeout_ms: u64,
}

impl SoundServiceConfig {
    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub(crate) fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

/// `DOWNLOAD_*`
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct DownloadConfig {
    #[serde(default = "default_download_quality")]
    pub(crate) quality: u32,
    #[serde(default = "default_download_file_formats")]
    pub(crate) file_formats: Vec<String>,
}

/// `ANALYSIS_*`
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AnalysisConfig {
    #[serde(default = "default_onset_algorithm")]
    pub(crate) onset_algorithm: OnsetAlgorithm,
    #[serde(default = "default_rhythm_algorithm")]
    pub(crate) rhythm_algorithm: RhythmAlgorithm,
    #[serde(default = "default_window_algorithm")]
    pub(crate) window_algorithm: WindowAlgorithm,
}

/// `SEARCH_*`
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SearchConfig {
    pub(crate) endpoint: String,
    #[serde(default = "default_search_results_limit")]
    pub(crate) results_limit: usize,
}

#[derive(Clone, Debug, Deserialize)]
struct GeneralConfig {
    #[serde(default = "default_bind_address")]
    bind_address: String,
    #[serde(default = "default_shutdown_timeout")]
    shutdown_timeout: u64,
    #[serde(default = "default_playback_file_format")]
    playback_file_format: String,
}

#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub(crate) bind_address: String,
    pub(crate) shutdown_timeout: u64,
    pub(crate) playback_file_format: String,
    pub(crate) sound_service: SoundServiceConfig,
    pub(crate) download: DownloadConfig,
    pub(crate) analysis: AnalysisConfig,
    pub(crate) search: SearchConfig,
}

fn section<T: DeserializeOwned>(
    prefix: &str,
    vars: &[(String, String)],
) -> Result<T, envy::Error> {
    envy::prefixed(prefix).from_iter(vars.iter().cloned())
}

impl Config {
    pub(crate) fn from_env() -> Self {
        match Self::from_vars(std::env::vars().collect()) {
            Ok(config) => config,
            Err(error) => panic!("Missing environment variable: {:#?}", error),
        }
    }

    fn from_vars(vars: Vec<(String, String)>) -> Result<Self, envy::Error> {
        let general: GeneralConfig = envy::from_iter(vars.iter().cloned())?;

        Ok(Self {
            bind_address: general.bind_address,
            shutdown_timeout: general.shutdown_timeout,
            playback_file_format: general.playback_file_format,
            sound_service: section("SOUND_SERVICE_", &vars)?,
            download: section("DOWNLOAD_", &vars)?,
            analysis: section("ANALYSIS_", &vars)?,
            search: section("SEARCH_", &vars)?,
        })
    }

    pub(crate) fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            download: DownloadSettings {
                quality: self.download.quality,
                file_formats: self.download.file_formats.clone(),
                playback_format: self.playback_file_format.clone(),
            },
            analysis: AnalysisSettings {
                onset: self.analysis.onset_algorithm,
                rhythm: self.analysis.rhythm_algorithm,
                window: self.analysis.window_algorithm,
            },
        }
    }
}
