//! Shared test helpers: a scripted in-memory fetcher.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fetcher::{FetchObserver, FetchOutcome, FetchRequest, Fetcher};
use crate::types::ProgressSample;

/// What the scripted fetcher does for one URL
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Resolve to `file_name` and write `body` into staging
    Serve {
        file_name: String,
        body: Vec<u8>,
        delay: Duration,
    },
    /// Fail with the given HTTP status
    Status(u16),
}

/// Fetcher that answers from a fixed URL table, without any network
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve `body` as `file_name` for `url`
    pub(crate) fn serve(self, url: &str, file_name: &str, body: &[u8]) -> Self {
        self.serve_slowly(url, file_name, body, Duration::ZERO)
    }

    /// Like [`serve`](Self::serve), holding the transfer open for `delay`
    pub(crate) fn serve_slowly(
        mut self,
        url: &str,
        file_name: &str,
        body: &[u8],
        delay: Duration,
    ) -> Self {
        self.scripts.insert(
            url.to_string(),
            Script::Serve {
                file_name: file_name.to_string(),
                body: body.to_vec(),
                delay,
            },
        );
        self
    }

    /// Answer `url` with an HTTP error status
    pub(crate) fn status(mut self, url: &str, status: u16) -> Self {
        self.scripts.insert(url.to_string(), Script::Status(status));
        self
    }

    /// Most transfers observed running at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// URLs fetched, in call order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        observer: &dyn FetchObserver,
    ) -> Result<FetchOutcome> {
        self.calls.lock().unwrap().push(request.url.clone());
        if request.cancel.is_cancelled() {
            return Ok(FetchOutcome::Aborted { file_name: None });
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        observer.on_progress(ProgressSample::indeterminate());

        let (file_name, body, delay) = match self.scripts.get(&request.url) {
            Some(Script::Serve {
                file_name,
                body,
                delay,
            }) => (file_name.clone(), body.clone(), *delay),
            Some(Script::Status(status)) => {
                return Err(Error::HttpStatus {
                    url: request.url.clone(),
                    status: *status,
                });
            }
            None => {
                return Err(Error::HttpStatus {
                    url: request.url.clone(),
                    status: 404,
                });
            }
        };

        observer.on_resolved(&file_name).await;
        if request.cancel.is_cancelled() {
            return Ok(FetchOutcome::Aborted {
                file_name: Some(file_name),
            });
        }

        tokio::time::sleep(delay).await;

        let staged = request.staging_dir.join(&file_name);
        tokio::fs::write(&staged, &body)
            .await
            .map_err(|e| Error::filesystem(&staged, e))?;

        let bytes = body.len() as u64;
        observer.on_progress(ProgressSample::new(bytes, Some(bytes)));
        Ok(FetchOutcome::Completed { file_name, bytes })
    }
}
