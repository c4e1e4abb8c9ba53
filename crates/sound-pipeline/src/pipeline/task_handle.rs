use crate::pipeline::dispatch::PipelineEvent;
use crate::pipeline::types::{StageFailure, TaskKind};
use crate::{MediaId, TaskId};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Everything a remote operation can report about itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<F, R> {
    Accepted,
    Rejected(String),
    Feedback(F),
    Completed(R),
    Failed(String),
}

/// Write side of a task handle, given to the remote capability that runs the operation.
///
/// Events are tagged with the task id and pushed onto the pipeline's event channel, so they
/// are observed by the dispatch loop in the order they were emitted.
pub struct TaskEventSink<F, R> {
    task_id: TaskId,
    sender: UnboundedSender<PipelineEvent>,
    wrap: fn(TaskId, TaskEvent<F, R>) -> PipelineEvent,
}

impl<F, R> Clone for TaskEventSink<F, R> {
    fn clone(&self) -> Self {
        Self {
            task_id: self.task_id,
            sender: self.sender.clone(),
            wrap: self.wrap,
        }
    }
}

impl<F, R> TaskEventSink<F, R> {
    pub(crate) fn new(
        task_id: TaskId,
        sender: UnboundedSender<PipelineEvent>,
        wrap: fn(TaskId, TaskEvent<F, R>) -> PipelineEvent,
    ) -> Self {
        Self {
            task_id,
            sender,
            wrap,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn accepted(&self) {
        self.emit(TaskEvent::Accepted);
    }

    pub fn rejected(&self, reason: impl Into<String>) {
        self.emit(TaskEvent::Rejected(reason.into()));
    }

    pub fn feedback(&self, feedback: F) {
        self.emit(TaskEvent::Feedback(feedback));
    }

    pub fn completed(&self, result: R) {
        self.emit(TaskEvent::Completed(result));
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.emit(TaskEvent::Failed(reason.into()));
    }

    pub fn emit(&self, event: TaskEvent<F, R>) {
        if self.sender.send((self.wrap)(self.task_id, event)).is_err() {
            debug!(task_id = %self.task_id, "Pipeline has stopped, task event dropped");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, PartialEq)]
pub(crate) enum TaskUpdate<F, R> {
    Accepted,
    Feedback(F),
    Completed(R),
    Failed(StageFailure),
}

/// The pipeline's view of one outstanding remote operation.
#[derive(Debug)]
pub(crate) struct TaskHandle<F> {
    kind: TaskKind,
    owner: MediaId,
    task_id: TaskId,
    acceptance: Acceptance,
    last_feedback: Option<F>,
    terminal: bool,
}

impl<F: Clone> TaskHandle<F> {
    pub(crate) fn new(kind: TaskKind, owner: MediaId) -> Self {
        Self {
            kind,
            owner,
            task_id: TaskId::generate(),
            acceptance: Acceptance::Pending,
            last_feedback: None,
            terminal: false,
        }
    }

    pub(crate) fn kind(&self) -> TaskKind {
        self.kind
    }

    pub(crate) fn owner(&self) -> &MediaId {
        &self.owner
    }

    pub(crate) fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub(crate) fn acceptance(&self) -> Acceptance {
        self.acceptance
    }

    pub(crate) fn last_feedback(&self) -> Option<&F> {
        self.last_feedback.as_ref()
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Returns `None` once a terminal event has been applied: the handle is inert from then on.
    pub(crate) fn apply<R>(&mut self, event: TaskEvent<F, R>) -> Option<TaskUpdate<F, R>> {
        if self.terminal {
            return None;
        }

        let update = match event {
            TaskEvent::Accepted => {
                self.acceptance = Acceptance::Accepted;
                TaskUpdate::Accepted
            }
            TaskEvent::Rejected(reason) => {
                self.acceptance = Acceptance::Rejected;
                self.terminal = true;
                TaskUpdate::Failed(StageFailure::Rejected(reason))
            }
            TaskEvent::Feedback(feedback) => {
                self.last_feedback = Some(feedback.clone());
                TaskUpdate::Feedback(feedback)
            }
            TaskEvent::Completed(result) => {
                self.terminal = true;
                TaskUpdate::Completed(result)
            }
            TaskEvent::Failed(reason) => {
                self.terminal = true;
                TaskUpdate::Failed(StageFailure::Aborted(reason))
            }
        };

        Some(update)
    }
}
