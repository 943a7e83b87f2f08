//! Worker loop and per-task execution

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::fetcher::{FetchObserver, FetchOutcome, FetchRequest};
use crate::types::{Event, ProgressSample, TaskState};
use crate::utils;

use super::{BatchContext, DownloadTask};

/// Claim and run tasks until the queue is drained
pub(crate) async fn run_worker(ctx: Arc<BatchContext>, slot: usize) {
    tracing::debug!(slot, "Download worker started");

    while let Some(task) = ctx.claim(slot) {
        ctx.emit(Event::TaskStarted {
            task: task.id(),
            slot,
            id: task.artifact().id.clone(),
            name: task.artifact().name.clone(),
        });

        run_task(&ctx, task, slot).await;
        ctx.finish(task);
    }

    tracing::debug!(slot, "Download worker idle, queue drained");
}

/// Bridges fetcher callbacks to task state, events and the dedup checks
struct TaskObserver<'a> {
    ctx: &'a BatchContext,
    task: &'a DownloadTask,
    slot: usize,
    cancel: CancellationToken,
    skipped: AtomicBool,
}

#[async_trait::async_trait]
impl FetchObserver for TaskObserver<'_> {
    async fn on_resolved(&self, file_name: &str) {
        let file_name = self.task.set_file_name(file_name);
        self.ctx.emit(Event::FileResolved {
            task: self.task.id(),
            file_name: file_name.to_string(),
        });

        if let Some(owner) = self.ctx.claim_file_name(file_name, self.task.id()).await {
            tracing::info!(
                artifact = %self.task.artifact().id,
                file_name,
                owner = owner.0,
                "File name already claimed in this batch, skipping transfer"
            );
            self.skipped.store(true, Ordering::SeqCst);
            self.cancel.cancel();
            return;
        }

        let existing = self.ctx.layout.destination_dir.join(file_name);
        match tokio::fs::try_exists(&existing).await {
            Ok(true) => {
                tracing::info!(
                    artifact = %self.task.artifact().id,
                    file_name,
                    "File already present, skipping transfer"
                );
                self.skipped.store(true, Ordering::SeqCst);
                self.cancel.cancel();
            }
            Ok(false) => {}
            Err(e) => {
                // Treat as absent and let the transfer overwrite it
                tracing::warn!(
                    path = %existing.display(),
                    error = %e,
                    "Could not check for existing file"
                );
            }
        }
    }

    fn on_progress(&self, sample: ProgressSample) {
        if sample.bytes_received > 0 || sample.fraction.is_some() {
            self.task.set_state(TaskState::Transferring);
        }
        self.ctx.emit(Event::Progress {
            task: self.task.id(),
            slot: self.slot,
            name: self.task.artifact().name.clone(),
            sample,
        });
    }
}

/// Drive one task to a terminal state
async fn run_task(ctx: &BatchContext, task: &DownloadTask, slot: usize) {
    let artifact = task.artifact();
    task.set_state(TaskState::Verifying);

    let request = FetchRequest {
        url: artifact.url.clone(),
        staging_dir: ctx.layout.staging_dir.clone(),
        cancel: CancellationToken::new(),
    };
    let observer = TaskObserver {
        ctx,
        task,
        slot,
        cancel: request.cancel.clone(),
        skipped: AtomicBool::new(false),
    };

    match ctx.fetcher.fetch(&request, &observer).await {
        Ok(FetchOutcome::Completed { file_name, bytes }) => {
            if task.set_file_name(&file_name) != file_name {
                tracing::error!(
                    artifact = %artifact.id,
                    file_name = %file_name,
                    "Fetcher completed under a different name than it resolved"
                );
                task.fail(format!("file name changed during transfer to {file_name:?}"));
                return;
            }
            let staged = ctx.layout.staging_dir.join(&file_name);
            let target = ctx.layout.destination_dir.join(&file_name);

            match utils::move_into_place(&staged, &target).await {
                Ok(()) => {
                    tracing::info!(
                        artifact = %artifact.id,
                        file_name = %file_name,
                        bytes,
                        "Artifact installed"
                    );
                    task.set_state(TaskState::Installed);
                }
                Err(e) => {
                    tracing::error!(artifact = %artifact.id, error = %e, "Failed to install artifact");
                    task.fail(e.to_string());
                }
            }
        }
        Ok(FetchOutcome::Aborted { .. }) if observer.skipped.load(Ordering::SeqCst) => {
            task.set_state(TaskState::SkippedExisting);
        }
        Ok(FetchOutcome::Aborted { .. }) => {
            tracing::warn!(artifact = %artifact.id, "Transfer aborted without a skip decision");
            task.fail("transfer aborted");
        }
        Err(e) => {
            tracing::error!(
                artifact = %artifact.id,
                url = %artifact.url,
                error = %e,
                "Artifact download failed"
            );
            task.fail(e.to_string());
        }
    }
}
