//! Per-task state written by the worker that owns the task.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::types::{ArtifactDescriptor, TaskId, TaskState};

/// One artifact download within a batch
///
/// The state lives in an atomic so reports can be read while workers run.
/// File name, error and slot are write-once.
#[derive(Debug)]
pub struct DownloadTask {
    id: TaskId,
    artifact: ArtifactDescriptor,
    state: AtomicU8,
    file_name: OnceLock<String>,
    error: OnceLock<String>,
    slot: OnceLock<usize>,
}

impl DownloadTask {
    /// Create a pending task
    pub fn new(id: TaskId, artifact: ArtifactDescriptor) -> Self {
        Self {
            id,
            artifact,
            state: AtomicU8::new(TaskState::Pending as u8),
            file_name: OnceLock::new(),
            error: OnceLock::new(),
            slot: OnceLock::new(),
        }
    }

    /// Position in the batch
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Artifact being downloaded
    pub fn artifact(&self) -> &ArtifactDescriptor {
        &self.artifact
    }

    /// Current state
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Resolved file name, once known
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.get().map(String::as_str)
    }

    /// Failure reason, for failed tasks
    pub fn error(&self) -> Option<&str> {
        self.error.get().map(String::as_str)
    }

    /// Slot of the worker that claimed the task
    pub fn slot(&self) -> Option<usize> {
        self.slot.get().copied()
    }

    pub(crate) fn claim(&self, slot: usize) {
        self.slot.set(slot).ok();
    }

    /// Move to `state` unless the task already finished
    pub(crate) fn set_state(&self, state: TaskState) {
        let current = self.state();
        if current.is_terminal() {
            tracing::warn!(
                artifact = %self.artifact.id,
                current = ?current,
                requested = ?state,
                "Ignoring state change on finished task"
            );
            return;
        }
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Record the resolved file name
    ///
    /// Returns the name the task ends up with: the first one recorded wins.
    pub(crate) fn set_file_name(&self, name: &str) -> &str {
        self.file_name.get_or_init(|| name.to_string())
    }

    /// Mark the task failed with a reason
    pub(crate) fn fail(&self, reason: impl Into<String>) {
        self.error.set(reason.into()).ok();
        self.set_state(TaskState::Failed);
    }
}
