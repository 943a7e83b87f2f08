//! reqwest-backed artifact fetcher

use std::path::Path;
use std::sync::OnceLock;

use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::download_with_retry;
use crate::types::ProgressSample;

use super::file_name::file_name_from_url;
use super::{FetchObserver, FetchOutcome, FetchRequest, Fetcher};

/// Production [`Fetcher`] streaming over HTTP(S).
///
/// Redirects are followed by the client; the file name is taken from the URL
/// the final response came from. The name resolved on the first successful
/// response is kept for every later attempt of the same fetch.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build a fetcher with its own client from the installer configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.install.user_agent.clone())
            .connect_timeout(config.install.connect_timeout)
            .build()?;
        Ok(Self::with_client(client, config.retry.clone()))
    }

    /// Build a fetcher around an existing client
    pub fn with_client(client: Client, retry: RetryConfig) -> Self {
        Self { client, retry }
    }

    /// One attempt: request, resolve the name, stream into staging
    async fn attempt(
        &self,
        request: &FetchRequest,
        observer: &dyn FetchObserver,
        resolved: &OnceLock<String>,
    ) -> Result<FetchOutcome> {
        let cancel = &request.cancel;
        let aborted = || FetchOutcome::Aborted {
            file_name: resolved.get().cloned(),
        };

        if cancel.is_cancelled() {
            return Ok(aborted());
        }

        observer.on_progress(ProgressSample::indeterminate());

        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(aborted()),
            response = self.client.get(&request.url).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let file_name = match resolved.get() {
            Some(name) => name.clone(),
            None => {
                let name = file_name_from_url(response.url())?;
                tracing::debug!(url = %request.url, final_url = %response.url(), file_name = %name, "Resolved file name");
                let name = resolved.get_or_init(|| name).clone();
                observer.on_resolved(&name).await;
                name
            }
        };

        if cancel.is_cancelled() {
            return Ok(aborted());
        }

        let total_bytes = response.content_length();
        let staging_path = request.staging_dir.join(&file_name);
        let mut file = tokio::fs::File::create(&staging_path)
            .await
            .map_err(|e| Error::filesystem(&staging_path, e))?;

        let mut received: u64 = 0;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    drop(file);
                    discard_staged(&staging_path).await;
                    return Ok(aborted());
                }
                chunk = response.chunk() => chunk,
            };

            match chunk {
                Ok(Some(bytes)) => {
                    file.write_all(&bytes)
                        .await
                        .map_err(|e| Error::filesystem(&staging_path, e))?;
                    received += bytes.len() as u64;
                    observer.on_progress(ProgressSample::new(received, total_bytes));
                }
                Ok(None) => break,
                Err(e) => {
                    drop(file);
                    discard_staged(&staging_path).await;
                    return Err(Error::Network(e));
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| Error::filesystem(&staging_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| Error::filesystem(&staging_path, e))?;

        Ok(FetchOutcome::Completed {
            file_name,
            bytes: received,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        observer: &dyn FetchObserver,
    ) -> Result<FetchOutcome> {
        let resolved = OnceLock::new();
        let result =
            download_with_retry(&self.retry, || self.attempt(request, observer, &resolved)).await;

        if let Err(e) = &result
            && let Some(name) = resolved.get()
        {
            tracing::debug!(url = %request.url, error = %e, "Discarding staged file of failed fetch");
            discard_staged(&request.staging_dir.join(name)).await;
        }
        result
    }
}

/// Remove a partially-written staging file, ignoring "already gone"
async fn discard_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged file");
    }
}
