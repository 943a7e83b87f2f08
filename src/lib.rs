//! # modpack-dl
//!
//! Installer core for mod packs: downloads the artifacts of a manifest with a
//! bounded pool of workers, then reconciles the target directory against it.
//!
//! ## Design Philosophy
//!
//! modpack-dl is designed to be:
//! - **Safe on disk** - Artifacts are staged and renamed into place, never half-written
//! - **Idempotent** - Re-running an install skips what is already there
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use modpack_dl::{Config, InstallLayout, Manifest, ModpackInstaller, ProgressAggregator, Side};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manifest = Manifest::from_json(&std::fs::read_to_string("pack.json")?)?;
//!     let config = Config::default();
//!     let layout = InstallLayout::new("/games/pack/mods", &config);
//!     let installer = ModpackInstaller::new(config)?;
//!
//!     // Follow progress as snapshots
//!     let (mut progress, _task) = ProgressAggregator::spawn(installer.subscribe());
//!     tokio::spawn(async move {
//!         while progress.changed().await.is_ok() {
//!             println!("{}", progress.borrow().overall_message);
//!         }
//!     });
//!
//!     let report = installer.install(&manifest, Side::Client, &layout).await?;
//!     for artifact in report.manual.outstanding() {
//!         println!("Download {} manually from {}", artifact.name, artifact.url);
//!     }
//!     report.wait_for_manual().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Artifact transfer over HTTP
pub mod fetcher;
/// End-to-end install flow
pub mod installer;
/// Modpack manifest parsing and side selection
pub mod manifest;
/// Tracking of manually acquired artifacts
pub mod manual;
/// Bounded download worker pool
pub mod pool;
/// Progress aggregation for display
pub mod progress;
/// Destination directory reconciliation
pub mod reconcile;
/// Retry logic with a fixed delay
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_helpers;

// Re-export commonly used types
pub use config::{Config, InstallConfig, RetryConfig};
pub use error::{Error, Result};
pub use fetcher::{FetchObserver, FetchOutcome, FetchRequest, Fetcher, HttpFetcher};
pub use installer::{InstallLayout, InstallReport, ModpackInstaller};
pub use manifest::{ArtifactSelection, Manifest};
pub use manual::{ManualSignal, ManualTracker, ManualUpdate};
pub use pool::{BatchLayout, BatchState, TaskReport, WorkerPool};
pub use progress::{ProgressAggregator, ProgressSnapshot};
pub use reconcile::{
    ExactStemMatcher, ManualMatcher, ReconciliationResult, SubstringMatcher, reconcile,
};
pub use types::{
    ArtifactDescriptor, Event, ManualState, ProgressSample, Side, Target, TaskId, TaskState,
};
