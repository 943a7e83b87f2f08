//! Tracking of manual artifacts until they are acquired out-of-band.
//!
//! Each tracked artifact owns a `watch` channel holding its [`ManualState`].
//! Signals from the outside world update it, and [`ManualTracker::wait_for`]
//! or [`ManualTracker::wait_all`] resolve once the state reaches `Done`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::types::{ArtifactDescriptor, Event, ManualState};

/// Report from the out-of-band download source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualSignal {
    /// The download page was opened
    Waiting,
    /// The download started
    Downloading,
    /// The download advanced
    Progress {
        /// Bytes received so far
        bytes_received: u64,
    },
    /// The file is in the destination directory
    Done,
}

impl ManualSignal {
    fn into_state(self) -> ManualState {
        match self {
            ManualSignal::Waiting => ManualState::Waiting,
            ManualSignal::Downloading => ManualState::Downloading {
                bytes_received: None,
            },
            ManualSignal::Progress { bytes_received } => ManualState::Downloading {
                bytes_received: Some(bytes_received),
            },
            ManualSignal::Done => ManualState::Done,
        }
    }
}

/// A signal addressed to one artifact, by id or display name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualUpdate {
    /// Artifact id or display name
    pub artifact: String,
    /// What happened
    pub signal: ManualSignal,
}

struct Tracked {
    artifact: ArtifactDescriptor,
    state: watch::Sender<ManualState>,
}

struct Inner {
    tracked: Vec<Tracked>,
    event_tx: broadcast::Sender<Event>,
    /// Emitted once, when the last artifact reaches `Done`
    completion: Option<Event>,
    completed: AtomicBool,
}

/// Shared view of the manual artifacts an install is waiting on
#[derive(Clone)]
pub struct ManualTracker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ManualTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTracker")
            .field("tracked", &self.inner.tracked.len())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

impl ManualTracker {
    /// Track `artifacts`, each starting `Outstanding`
    pub fn new(artifacts: Vec<ArtifactDescriptor>, event_tx: broadcast::Sender<Event>) -> Self {
        Self::build(artifacts, event_tx, None)
    }

    /// Like [`new`](Self::new), emitting `completion` once everything is `Done`
    pub(crate) fn with_completion(
        artifacts: Vec<ArtifactDescriptor>,
        event_tx: broadcast::Sender<Event>,
        completion: Event,
    ) -> Self {
        Self::build(artifacts, event_tx, Some(completion))
    }

    fn build(
        artifacts: Vec<ArtifactDescriptor>,
        event_tx: broadcast::Sender<Event>,
        completion: Option<Event>,
    ) -> Self {
        let tracked = artifacts
            .into_iter()
            .map(|artifact| Tracked {
                artifact,
                state: watch::Sender::new(ManualState::Outstanding),
            })
            .collect();
        Self {
            inner: Arc::new(Inner {
                tracked,
                event_tx,
                completion,
                completed: AtomicBool::new(false),
            }),
        }
    }

    fn find(&self, artifact: &str) -> Result<&Tracked> {
        let tracked = &self.inner.tracked;
        tracked
            .iter()
            .find(|t| t.artifact.id == artifact)
            .or_else(|| tracked.iter().find(|t| t.artifact.name == artifact))
            .ok_or_else(|| Error::UnknownArtifact(artifact.to_string()))
    }

    /// Apply a signal to the artifact with this id or display name
    ///
    /// Returns the resulting state. Signals after `Done` are ignored.
    pub fn signal(&self, artifact: &str, signal: ManualSignal) -> Result<ManualState> {
        let tracked = self.find(artifact)?;
        let next = signal.into_state();

        let mut ignored = false;
        let changed = tracked.state.send_if_modified(|state| {
            if *state == ManualState::Done {
                ignored = true;
                return false;
            }
            if *state == next {
                return false;
            }
            *state = next;
            true
        });

        if ignored {
            tracing::debug!(artifact = %tracked.artifact.id, signal = ?signal, "Ignoring signal for finished manual artifact");
            return Ok(ManualState::Done);
        }

        if changed {
            tracing::info!(artifact = %tracked.artifact.id, state = ?next, "Manual artifact state changed");
            self.inner
                .event_tx
                .send(Event::ManualStateChanged {
                    id: tracked.artifact.id.clone(),
                    name: tracked.artifact.name.clone(),
                    state: next,
                })
                .ok();

            if next == ManualState::Done && self.is_resolved() {
                self.complete();
            }
        }

        Ok(next)
    }

    fn complete(&self) {
        if self.inner.completed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("All manual artifacts acquired");
        if let Some(event) = &self.inner.completion {
            self.inner.event_tx.send(event.clone()).ok();
        }
    }

    /// Current state of the artifact with this id
    pub fn state(&self, id: &str) -> Option<ManualState> {
        self.inner
            .tracked
            .iter()
            .find(|t| t.artifact.id == id)
            .map(|t| *t.state.borrow())
    }

    /// Artifacts not yet `Done`, in tracking order
    pub fn outstanding(&self) -> Vec<&ArtifactDescriptor> {
        self.inner
            .tracked
            .iter()
            .filter(|t| *t.state.borrow() != ManualState::Done)
            .map(|t| &t.artifact)
            .collect()
    }

    /// Whether every tracked artifact is `Done`
    pub fn is_resolved(&self) -> bool {
        self.inner
            .tracked
            .iter()
            .all(|t| *t.state.borrow() == ManualState::Done)
    }

    /// Resolve once the artifact with this id is `Done`
    pub async fn wait_for(&self, id: &str) -> Result<()> {
        let tracked = self
            .inner
            .tracked
            .iter()
            .find(|t| t.artifact.id == id)
            .ok_or_else(|| Error::UnknownArtifact(id.to_string()))?;
        wait_done(tracked).await
    }

    /// Resolve once every tracked artifact is `Done`
    pub async fn wait_all(&self) -> Result<()> {
        futures::future::try_join_all(self.inner.tracked.iter().map(wait_done)).await?;
        Ok(())
    }

    /// Feed signals from an external source until everything is resolved
    ///
    /// The task ends when every artifact is `Done` or the sender side closes.
    /// Updates naming unknown artifacts are logged and dropped.
    pub fn listen(&self, mut updates: mpsc::Receiver<ManualUpdate>) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tracker.wait_all() => break,
                    update = updates.recv() => {
                        let Some(update) = update else {
                            tracing::debug!("Manual update source closed");
                            break;
                        };
                        if let Err(e) = tracker.signal(&update.artifact, update.signal) {
                            tracing::warn!(artifact = %update.artifact, error = %e, "Dropping manual update");
                        }
                    }
                }
            }
        })
    }
}

async fn wait_done(tracked: &Tracked) -> Result<()> {
    let mut rx = tracked.state.subscribe();
    rx.wait_for(|state| *state == ManualState::Done)
        .await
        .map(|_| ())
        .map_err(|_| Error::Other(format!("tracker for {} dropped", tracked.artifact.id)))
}
