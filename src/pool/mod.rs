//! Bounded worker pool draining a batch of artifact downloads.
//!
//! A fixed set of workers (one per slot) share an atomic cursor over an
//! immutable task list. Each worker claims the next index, runs that task to a
//! terminal state through the [`Fetcher`], and claims again until the cursor
//! runs past the end. The batch resolves when every worker has been joined.
//!
//! - [`task`] - per-task state shared between the pool and its report
//! - [`worker`] - worker loop, dedup check and install of staged files

mod task;
mod worker;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use task::DownloadTask;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::types::{ArtifactDescriptor, Event, TaskId, TaskState};

/// Directories a batch reads from and writes to
#[derive(Clone, Debug)]
pub struct BatchLayout {
    /// Final location of installed artifacts
    pub destination_dir: PathBuf,
    /// Where transfers are streamed before the atomic move; must exist
    pub staging_dir: PathBuf,
}

/// Final report for one task
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Position in the batch
    pub task: TaskId,
    /// Artifact id
    pub id: String,
    /// Artifact display name
    pub name: String,
    /// Terminal state
    pub state: TaskState,
    /// Resolved file name, if the request got that far
    pub file_name: Option<String>,
    /// Failure reason for `Failed` tasks
    pub error: Option<String>,
}

/// Outcome of one batch run
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchState {
    /// One report per task, in queue order
    pub tasks: Vec<TaskReport>,
    /// Number of automatic artifacts in the batch
    pub total: usize,
    /// Number of tasks that reached a terminal state
    pub completed: usize,
    /// Artifact id to file name for artifacts installed or already present
    pub files: HashMap<String, String>,
}

impl BatchState {
    /// Number of artifacts moved into the destination
    pub fn installed_count(&self) -> usize {
        self.installed().count()
    }

    /// Number of artifacts skipped because the destination already had them
    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    /// Number of artifacts that failed
    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    fn with_state(&self, state: TaskState) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(move |t| t.state == state)
    }

    /// Reports of the installed tasks
    pub fn installed(&self) -> impl Iterator<Item = &TaskReport> {
        self.with_state(TaskState::Installed)
    }

    /// Reports of the tasks skipped because their file was already present
    pub fn skipped(&self) -> impl Iterator<Item = &TaskReport> {
        self.with_state(TaskState::SkippedExisting)
    }

    /// Reports of the failed tasks
    pub fn failed(&self) -> impl Iterator<Item = &TaskReport> {
        self.with_state(TaskState::Failed)
    }

    /// Whether every task reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.completed == self.total && self.tasks.iter().all(|t| t.state.is_terminal())
    }

    /// "N failed" summary, or `None` when nothing failed
    pub fn failure_summary(&self) -> Option<String> {
        match self.failed_count() {
            0 => None,
            n => Some(format!("{n} failed")),
        }
    }

    /// Terminal state of an artifact, by id
    pub fn state_of(&self, id: &str) -> Option<TaskState> {
        self.tasks.iter().find(|t| t.id == id).map(|t| t.state)
    }
}

/// State shared by all workers of one batch
pub(crate) struct BatchContext {
    pub(crate) tasks: Vec<DownloadTask>,
    pub(crate) cursor: AtomicUsize,
    pub(crate) completed: AtomicUsize,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) layout: BatchLayout,
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Destination file name to the task writing it
    pub(crate) file_names: Mutex<HashMap<String, TaskId>>,
}

impl BatchContext {
    /// Broadcast an event; having no subscribers is fine
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Claim the next unclaimed task for the worker in `slot`
    pub(crate) fn claim(&self, slot: usize) -> Option<&DownloadTask> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let task = self.tasks.get(index)?;
        task.claim(slot);
        Some(task)
    }

    /// Reserve `file_name` for `task`
    ///
    /// Returns the other task already holding the name. Re-claiming a name the
    /// task holds (a retried request) succeeds.
    pub(crate) async fn claim_file_name(&self, file_name: &str, task: TaskId) -> Option<TaskId> {
        let mut file_names = self.file_names.lock().await;
        match file_names.entry(file_name.to_string()) {
            Entry::Occupied(owner) if *owner.get() != task => Some(*owner.get()),
            Entry::Occupied(_) => None,
            Entry::Vacant(entry) => {
                entry.insert(task);
                None
            }
        }
    }

    /// Record that `task` reached a terminal state and report overall progress
    pub(crate) fn finish(&self, task: &DownloadTask) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.emit(Event::TaskFinished {
            task: task.id(),
            slot: task.slot().unwrap_or_default(),
            id: task.artifact().id.clone(),
            state: task.state(),
            completed,
            total: self.tasks.len(),
            error: task.error().map(str::to_string),
        });
    }
}

/// Fixed-size pool of download workers
#[derive(Clone)]
pub struct WorkerPool {
    fetcher: Arc<dyn Fetcher>,
    slots: usize,
    event_tx: broadcast::Sender<Event>,
}

impl WorkerPool {
    /// Create a pool with `slots` workers reporting on `event_tx`
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        slots: usize,
        event_tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        if slots == 0 {
            return Err(Error::config("slots", "at least one download slot is required"));
        }
        Ok(Self {
            fetcher,
            slots,
            event_tx,
        })
    }

    /// Configured slot count
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Download every artifact, returning once each one is terminal
    ///
    /// Individual failures never abort the batch; they show up as `Failed`
    /// tasks in the returned state. The only errors are for unusable input.
    pub async fn run(
        &self,
        artifacts: Vec<ArtifactDescriptor>,
        layout: &BatchLayout,
    ) -> Result<BatchState> {
        let mut seen = HashSet::with_capacity(artifacts.len());
        for artifact in &artifacts {
            if !seen.insert(artifact.id.as_str()) {
                return Err(Error::Manifest(format!(
                    "artifact {:?} queued twice in one batch",
                    artifact.id
                )));
            }
        }

        let tasks: Vec<DownloadTask> = artifacts
            .into_iter()
            .enumerate()
            .map(|(i, artifact)| DownloadTask::new(TaskId(i), artifact))
            .collect();
        let total = tasks.len();
        let workers = self.slots.min(total);

        let ctx = Arc::new(BatchContext {
            tasks,
            cursor: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            fetcher: Arc::clone(&self.fetcher),
            layout: layout.clone(),
            event_tx: self.event_tx.clone(),
            file_names: Mutex::new(HashMap::with_capacity(total)),
        });

        tracing::info!(
            total,
            slots = workers,
            destination = %layout.destination_dir.display(),
            "Starting download batch"
        );
        ctx.emit(Event::BatchStarted {
            total,
            slots: workers,
        });

        let mut join_set = tokio::task::JoinSet::new();
        for slot in 0..workers {
            join_set.spawn(worker::run_worker(Arc::clone(&ctx), slot));
        }
        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Download worker exited abnormally");
            }
        }

        // A worker that died mid-task leaves its task non-terminal
        for task in ctx.tasks.iter().filter(|t| !t.state().is_terminal()) {
            task.fail("download worker exited before the task finished");
            ctx.finish(task);
        }

        let state = build_state(&ctx);
        tracing::info!(
            installed = state.installed_count(),
            skipped = state.skipped_count(),
            failed = state.failed_count(),
            "Download batch complete"
        );
        ctx.emit(Event::BatchComplete {
            installed: state.installed_count(),
            skipped: state.skipped_count(),
            failed: state.failed_count(),
        });

        Ok(state)
    }
}

fn build_state(ctx: &BatchContext) -> BatchState {
    let mut files = HashMap::new();
    let tasks = ctx
        .tasks
        .iter()
        .map(|task| {
            let state = task.state();
            let file_name = task.file_name().map(str::to_string);
            if matches!(state, TaskState::Installed | TaskState::SkippedExisting)
                && let Some(name) = &file_name
            {
                files.insert(task.artifact().id.clone(), name.clone());
            }
            TaskReport {
                task: task.id(),
                id: task.artifact().id.clone(),
                name: task.artifact().name.clone(),
                state,
                file_name,
                error: task.error().map(str::to_string),
            }
        })
        .collect();

    BatchState {
        tasks,
        total: ctx.tasks.len(),
        completed: ctx.completed.load(Ordering::SeqCst),
        files,
    }
}
