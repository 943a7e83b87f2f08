//! Progress aggregation for a UI: overall count plus one line per slot.
//!
//! The aggregator is a pure fold over [`Event`]s. [`ProgressAggregator::spawn`]
//! runs it against a broadcast receiver and publishes every change on a
//! `watch` channel, so a slow consumer only ever sees the latest snapshot.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::types::{Event, ProgressSample};

/// Overall message after the batch, while manual artifacts are outstanding
pub const AWAITING_MANUAL_MESSAGE: &str = "Waiting for manually initiated downloads...";

/// Overall message once the install is finished
pub const COMPLETE_MESSAGE: &str = "Modpack installation complete!";

/// Point-in-time view of install progress
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Tasks that reached a terminal state
    pub completed: usize,
    /// Tasks in the batch
    pub total: usize,
    /// `completed / total`, in `[0.0, 1.0]`
    pub fraction: f64,
    /// Headline status line
    pub overall_message: String,
    /// Status line per active worker slot
    pub slot_messages: BTreeMap<usize, String>,
}

/// Folds install events into a [`ProgressSnapshot`]
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    snapshot: ProgressSnapshot,
}

impl ProgressAggregator {
    /// Create an aggregator with an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Apply one event, returning whether the snapshot changed
    pub fn apply(&mut self, event: &Event) -> bool {
        let before = self.snapshot.clone();
        let snap = &mut self.snapshot;

        match event {
            Event::BatchStarted { total, .. } => {
                snap.total = *total;
                snap.completed = 0;
                snap.slot_messages.clear();
                self.refresh_overall();
            }
            Event::TaskStarted { slot, name, .. } => {
                snap.slot_messages.insert(*slot, verifying(name));
            }
            Event::Progress {
                slot, name, sample, ..
            } => {
                snap.slot_messages.insert(*slot, slot_message(name, sample));
            }
            Event::TaskFinished {
                slot,
                completed,
                total,
                ..
            } => {
                snap.total = *total;
                // Events can arrive out of order; never count backwards
                snap.completed = snap.completed.max(*completed);
                snap.slot_messages.remove(slot);
                self.refresh_overall();
            }
            Event::BatchComplete { .. } => {
                snap.slot_messages.clear();
            }
            Event::AwaitingManual { .. } => {
                snap.overall_message = AWAITING_MANUAL_MESSAGE.to_string();
            }
            Event::InstallComplete { .. } => {
                snap.slot_messages.clear();
                snap.fraction = 1.0;
                snap.overall_message = COMPLETE_MESSAGE.to_string();
            }
            _ => {}
        }

        self.snapshot != before
    }

    fn refresh_overall(&mut self) {
        let snap = &mut self.snapshot;
        snap.fraction = if snap.total == 0 {
            1.0
        } else {
            (snap.completed as f64 / snap.total as f64).min(1.0)
        };
        snap.overall_message = format!(
            "Downloading mods... ({} of {} complete)",
            snap.completed, snap.total
        );
    }

    /// Run an aggregator over `events` on its own task
    ///
    /// The task ends when the broadcast channel closes. Lagged receivers skip
    /// the missed events and continue.
    pub fn spawn(
        mut events: broadcast::Receiver<Event>,
    ) -> (watch::Receiver<ProgressSnapshot>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());

        let handle = tokio::spawn(async move {
            let mut aggregator = ProgressAggregator::new();
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if aggregator.apply(&event) {
                            tx.send_replace(aggregator.snapshot().clone());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Progress aggregator lagged behind events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        (rx, handle)
    }
}

fn verifying(name: &str) -> String {
    format!("Verifying {name}... (0%)")
}

fn slot_message(name: &str, sample: &ProgressSample) -> String {
    match sample.fraction {
        None => verifying(name),
        Some(fraction) => {
            let percent = (fraction * 100.0).floor() as u32;
            format!("Downloading {name}... ({percent}%)")
        }
    }
}
