//! Core types for modpack-dl

use serde::{Deserialize, Serialize};

/// Which installation an artifact belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Only installed on clients
    Client,
    /// Only installed on dedicated servers
    Server,
    /// Installed everywhere (default)
    #[default]
    Both,
}

impl Target {
    /// Whether an artifact with this target belongs in an install for `side`
    pub fn includes(&self, side: Side) -> bool {
        match self {
            Target::Both => true,
            Target::Client => side == Side::Client,
            Target::Server => side == Side::Server,
        }
    }
}

/// The flavour of install being performed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Player installation
    Client,
    /// Dedicated server installation
    Server,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Server => write!(f, "server"),
        }
    }
}

/// One downloadable file described by a manifest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    /// Identifier, unique within a manifest (also the manual-match key)
    pub id: String,
    /// Human-readable name shown in progress messages
    pub name: String,
    /// Source URL; for manual artifacts, the page the user downloads from
    pub url: String,
    /// Which installs this artifact belongs to
    #[serde(default)]
    pub target: Target,
    /// Acquired out-of-band rather than fetched by URL
    #[serde(default)]
    pub manual: bool,
}

impl ArtifactDescriptor {
    /// Create an automatic artifact targeting both sides
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            target: Target::Both,
            manual: false,
        }
    }

    /// Restrict the artifact to one target
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Mark the artifact as manually acquired
    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }
}

/// Position of a task within its batch
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub usize);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a download task
///
/// `Installed`, `SkippedExisting` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TaskState {
    /// Waiting in the queue
    Pending = 0,
    /// Request in flight, size and file name not yet known
    Verifying = 1,
    /// Bytes are streaming into the staging directory
    Transferring = 2,
    /// Moved into the destination directory
    Installed = 3,
    /// Destination already held a file with the resolved name
    SkippedExisting = 4,
    /// Retries exhausted or a filesystem operation failed
    Failed = 5,
}

impl TaskState {
    /// Whether the task has finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Installed | TaskState::SkippedExisting | TaskState::Failed
        )
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Pending,
            1 => TaskState::Verifying,
            2 => TaskState::Transferring,
            3 => TaskState::Installed,
            4 => TaskState::SkippedExisting,
            _ => TaskState::Failed,
        }
    }
}

/// A single progress observation for one transfer
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    /// Bytes written to the staging file so far
    pub bytes_received: u64,
    /// Total size announced by the server, if any
    pub total_bytes: Option<u64>,
    /// Completion in `[0.0, 1.0]`; `None` while indeterminate
    pub fraction: Option<f64>,
}

impl ProgressSample {
    /// Sample used while the request is in flight and nothing is known yet
    pub fn indeterminate() -> Self {
        Self {
            bytes_received: 0,
            total_bytes: None,
            fraction: None,
        }
    }

    /// Sample after `bytes_received` bytes out of an optional total
    pub fn new(bytes_received: u64, total_bytes: Option<u64>) -> Self {
        let fraction = match total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some((bytes_received as f64 / total as f64).min(1.0)),
            None => None,
        };
        Self {
            bytes_received,
            total_bytes,
            fraction,
        }
    }

    /// Whether the fraction is unknown
    pub fn is_indeterminate(&self) -> bool {
        self.fraction.is_none()
    }
}

/// State of a manually-acquired artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualState {
    /// Nothing heard from the out-of-band source yet
    Outstanding,
    /// The external download page is open
    Waiting,
    /// The external download is running
    Downloading {
        /// Bytes received so far, if reported
        #[serde(skip_serializing_if = "Option::is_none")]
        bytes_received: Option<u64>,
    },
    /// The file landed in the destination directory
    Done,
}

/// Event emitted during an install
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Install run started for one side
    InstallStarted {
        /// Side being installed
        side: Side,
        /// Number of automatic artifacts selected
        automatic: usize,
        /// Number of manual artifacts selected
        manual: usize,
    },

    /// Worker pool started draining the queue
    BatchStarted {
        /// Number of tasks in the batch
        total: usize,
        /// Number of workers started
        slots: usize,
    },

    /// A worker claimed a task
    TaskStarted {
        /// Task position in the batch
        task: TaskId,
        /// Worker slot running the task
        slot: usize,
        /// Artifact id
        id: String,
        /// Artifact display name
        name: String,
    },

    /// The final file name of a task became known
    FileResolved {
        /// Task position in the batch
        task: TaskId,
        /// Resolved file name
        file_name: String,
    },

    /// Per-task transfer progress
    Progress {
        /// Task position in the batch
        task: TaskId,
        /// Worker slot running the task
        slot: usize,
        /// Artifact display name
        name: String,
        /// Progress observation
        sample: ProgressSample,
    },

    /// A task reached a terminal state
    TaskFinished {
        /// Task position in the batch
        task: TaskId,
        /// Worker slot that ran the task
        slot: usize,
        /// Artifact id
        id: String,
        /// Terminal state
        state: TaskState,
        /// Tasks finished so far, including this one
        completed: usize,
        /// Tasks in the batch
        total: usize,
        /// Error message for failed tasks
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Every task in the batch is terminal
    BatchComplete {
        /// Tasks moved into the destination
        installed: usize,
        /// Tasks skipped because the file already existed
        skipped: usize,
        /// Tasks that failed
        failed: usize,
    },

    /// Destination directory reconciled against the manifest
    ReconcileComplete {
        /// Files deleted as stale
        stale: usize,
        /// Manual artifacts found already present
        satisfied_manual: usize,
        /// Manual artifacts still needing out-of-band action
        unresolved_manual: usize,
    },

    /// A manual artifact changed state
    ManualStateChanged {
        /// Artifact id
        id: String,
        /// Artifact display name
        name: String,
        /// New state
        state: ManualState,
    },

    /// Install is done except for outstanding manual artifacts
    AwaitingManual {
        /// Number of manual artifacts still outstanding
        outstanding: usize,
    },

    /// Install run finished, including every manual artifact
    InstallComplete {
        /// Side that was installed
        side: Side,
        /// Number of failed automatic artifacts
        failed: usize,
    },
}
