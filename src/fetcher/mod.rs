//! Single-artifact transfers into the staging directory.
//!
//! - [`http`] - reqwest-backed [`Fetcher`] with retries and cancellation
//! - [`file_name`] - file name resolution from the post-redirect URL

mod file_name;
mod http;


pub use file_name::file_name_from_url;
pub use http::HttpFetcher;

use crate::error::Result;
use crate::types::ProgressSample;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Parameters for one artifact transfer
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// URL as written in the manifest (may redirect)
    pub url: String,
    /// Directory the bytes are streamed into
    pub staging_dir: PathBuf,
    /// Aborts the transfer when cancelled; an aborted fetch is not a failure
    pub cancel: CancellationToken,
}

/// How a fetch ended when it did not fail
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All bytes are in `staging_dir/<file_name>`
    Completed {
        /// File name resolved from the final URL
        file_name: String,
        /// Bytes written
        bytes: u64,
    },
    /// The cancellation token fired; nothing is left in the staging directory
    Aborted {
        /// File name, if it was resolved before the abort
        file_name: Option<String>,
    },
}

/// Callbacks a [`Fetcher`] drives during a transfer
#[async_trait::async_trait]
pub trait FetchObserver: Send + Sync {
    /// Called once, as soon as the final file name is known and before any byte
    /// is written. Cancelling the request token here aborts the transfer.
    async fn on_resolved(&self, file_name: &str);

    /// Called at the start of each attempt (indeterminate) and after every chunk
    fn on_progress(&self, sample: ProgressSample);
}

/// Abstraction over artifact transfers, enabling testability.
///
/// Implementations write only below `request.staging_dir`; moving the file
/// into the destination is the caller's job.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Transfer one artifact, retrying transient failures
    async fn fetch(
        &self,
        request: &FetchRequest,
        observer: &dyn FetchObserver,
    ) -> Result<FetchOutcome>;
}
