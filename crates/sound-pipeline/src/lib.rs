mod pipeline;
pub use pipeline::*;

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use uuid::Uuid;

// MediaId
#[derive(Eq, PartialEq, Clone, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub(crate) String);

impl Deref for MediaId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for MediaId {
    fn from(value: String) -> Self {
        MediaId(value)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        MediaId(value.to_string())
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// TaskId
#[derive(Eq, PartialEq, Clone, Copy, Hash, Debug)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn generate() -> Self {
        TaskId(Uuid::new_v4())
    }
}

impl Deref for TaskId {
    type Target = Uuid;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
