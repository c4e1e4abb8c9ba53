mod dispatch;
mod orchestrator;
mod registry;
mod stages;
mod task_handle;
mod traits;
mod types;

pub use dispatch::{Dispatcher, Pipeline, PipelineEvent, PipelineHandle, PipelineStopped};
pub use orchestrator::{
    EnqueueError, Orchestrator, PipelineDependencies, PipelineError, PipelineSettings,
};
pub use registry::MediaRegistry;
pub use stages::{AnalysisSettings, DownloadSettings};
pub use task_handle::{Acceptance, TaskEvent, TaskEventSink};
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod mocks;
#[cfg(test)]
mod orchestrator_tests;
