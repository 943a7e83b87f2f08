//! Top-level install flow tying the pool, reconciliation and manual tracking together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::manifest::Manifest;
use crate::manual::ManualTracker;
use crate::pool::{BatchLayout, BatchState, WorkerPool};
use crate::reconcile::{self, ManualMatcher, ReconciliationResult, SubstringMatcher};
use crate::types::{Event, Side};
use crate::utils;

/// Where an install writes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallLayout {
    /// Directory holding the installed artifacts (e.g. `<instance>/mods`)
    pub destination_dir: PathBuf,
    /// Directory transfers are staged in; removed after the batch
    pub staging_dir: PathBuf,
}

impl InstallLayout {
    /// Layout with the configured staging subdirectory inside `destination_dir`
    pub fn new(destination_dir: impl Into<PathBuf>, config: &Config) -> Self {
        let destination_dir = destination_dir.into();
        let staging_dir = destination_dir.join(&config.install.staging_dir_name);
        Self {
            destination_dir,
            staging_dir,
        }
    }

    /// Override the staging directory
    pub fn with_staging_dir(mut self, staging_dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = staging_dir.into();
        self
    }
}

impl From<&InstallLayout> for BatchLayout {
    fn from(layout: &InstallLayout) -> Self {
        BatchLayout {
            destination_dir: layout.destination_dir.clone(),
            staging_dir: layout.staging_dir.clone(),
        }
    }
}

/// Result of one install run
#[derive(Debug)]
pub struct InstallReport {
    /// Side that was installed
    pub side: Side,
    /// Per-artifact outcome of the automatic downloads
    pub batch: BatchState,
    /// Stale files removed and manual artifacts found on disk
    pub reconciliation: ReconciliationResult,
    /// Manual artifacts still to be acquired
    pub manual: ManualTracker,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the automatic part of the run finished
    pub finished_at: DateTime<Utc>,
}

impl InstallReport {
    /// Whether nothing failed and nothing manual is outstanding
    pub fn is_complete(&self) -> bool {
        self.batch.failed_count() == 0 && self.manual.is_resolved()
    }

    /// Wait until every outstanding manual artifact is acquired
    pub async fn wait_for_manual(&self) -> Result<()> {
        self.manual.wait_all().await
    }
}

/// Installs a modpack manifest into a directory
///
/// # Example
///
/// ```no_run
/// use modpack_dl::{Config, InstallLayout, Manifest, ModpackInstaller, Side};
///
/// # async fn run(manifest: Manifest) -> modpack_dl::Result<()> {
/// let config = Config::default();
/// let layout = InstallLayout::new("/games/pack/mods", &config);
/// let installer = ModpackInstaller::new(config)?;
///
/// let report = installer.install(&manifest, Side::Client, &layout).await?;
/// println!("{} installed, {} failed", report.batch.installed_count(), report.batch.failed_count());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ModpackInstaller {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    matcher: Arc<dyn ManualMatcher>,
    event_tx: broadcast::Sender<Event>,
}

impl ModpackInstaller {
    /// Validate `config` and build an installer with the HTTP fetcher
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config)?;
        let (event_tx, _rx) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            matcher: Arc::new(SubstringMatcher),
            event_tx,
        })
    }

    /// Replace the fetcher
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Replace the manual-artifact matcher
    pub fn with_matcher(mut self, matcher: Arc<dyn ManualMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Subscribe to install events
    ///
    /// Events sent before subscribing are not replayed. A receiver that falls
    /// more than `event_channel_capacity` events behind gets `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Install the artifacts of `manifest` for `side` into `layout`
    ///
    /// Runs the automatic downloads, removes the staging directory, deletes
    /// files that are not part of the pack, and returns a tracker for the
    /// manual artifacts that are still missing. Individual download failures
    /// are reported in [`InstallReport::batch`], not as an error.
    ///
    /// # Errors
    ///
    /// Directory creation, staging cleanup or reconciliation failures, and a
    /// layout whose staging directory is the destination or one of its parents.
    pub async fn install(
        &self,
        manifest: &Manifest,
        side: Side,
        layout: &InstallLayout,
    ) -> Result<InstallReport> {
        let started_at = Utc::now();
        check_layout(layout)?;

        let selection = manifest.select(side);
        tracing::info!(
            %side,
            automatic = selection.automatic.len(),
            manual = selection.manual.len(),
            destination = %layout.destination_dir.display(),
            "Starting modpack install"
        );
        self.emit(Event::InstallStarted {
            side,
            automatic: selection.automatic.len(),
            manual: selection.manual.len(),
        });

        tokio::fs::create_dir_all(&layout.destination_dir)
            .await
            .map_err(|e| Error::filesystem(&layout.destination_dir, e))?;
        let leftovers = utils::prepare_staging_dir(&layout.staging_dir).await?;
        if leftovers > 0 {
            tracing::info!(leftovers, "Cleared staged files from an interrupted run");
        }

        let pool = WorkerPool::new(
            Arc::clone(&self.fetcher),
            self.config.install.slots,
            self.event_tx.clone(),
        )?;
        let batch = pool
            .run(selection.automatic, &BatchLayout::from(layout))
            .await?;

        utils::remove_staging_dir(&layout.staging_dir).await?;

        let reconciliation = reconcile::reconcile(
            &layout.destination_dir,
            &batch.files,
            &selection.manual,
            self.matcher.as_ref(),
        )
        .await?;
        self.emit(Event::ReconcileComplete {
            stale: reconciliation.stale_files.len(),
            satisfied_manual: reconciliation.satisfied_manual_ids.len(),
            unresolved_manual: reconciliation.unresolved_manual_ids.len(),
        });

        let unresolved = selection
            .manual
            .into_iter()
            .filter(|a| reconciliation.unresolved_manual_ids.contains(&a.id))
            .collect::<Vec<_>>();
        let outstanding = unresolved.len();
        let completion = Event::InstallComplete {
            side,
            failed: batch.failed_count(),
        };
        let manual =
            ManualTracker::with_completion(unresolved, self.event_tx.clone(), completion.clone());

        if outstanding == 0 {
            tracing::info!(
                %side,
                installed = batch.installed_count(),
                skipped = batch.skipped_count(),
                failed = batch.failed_count(),
                "Modpack install complete"
            );
            self.emit(completion);
        } else {
            tracing::info!(
                %side,
                outstanding,
                "Automatic downloads done, waiting for manual artifacts"
            );
            self.emit(Event::AwaitingManual { outstanding });
        }

        Ok(InstallReport {
            side,
            batch,
            reconciliation,
            manual,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Staging is deleted after the batch, so it must not contain the destination
fn check_layout(layout: &InstallLayout) -> Result<()> {
    if contains_dir(&layout.staging_dir, &layout.destination_dir) {
        return Err(Error::config(
            "staging_dir",
            "staging directory must not be the destination directory or one of its parents",
        ));
    }
    Ok(())
}

/// Component-wise, so `/games/mod` does not contain `/games/mods`
fn contains_dir(parent: &Path, dir: &Path) -> bool {
    dir.starts_with(parent)
}
