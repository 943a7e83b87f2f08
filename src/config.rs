//! Configuration types for modpack-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Install behavior configuration (concurrency, staging, HTTP client)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Number of concurrent download workers (default: 3)
    #[serde(default = "default_slots")]
    pub slots: usize,

    /// Name of the staging subdirectory created inside the destination (default: "downloading")
    ///
    /// Artifacts are streamed into this directory and renamed into the destination
    /// once complete, so the destination never holds a partial file.
    #[serde(default = "default_staging_dir_name")]
    pub staging_dir_name: String,

    /// User-Agent header sent with every artifact request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// TCP connect timeout for artifact requests (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_secs_serde")]
    pub connect_timeout: Duration,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            staging_dir_name: default_staging_dir_name(),
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

/// Retry configuration for transient transfer failures
///
/// `max_attempts` counts the first try: with the default of 3, a fetch that
/// keeps failing is attempted three times and waits `delay` twice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts per artifact, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 500 milliseconds)
    #[serde(default = "default_retry_delay", with = "duration_millis_serde")]
    pub delay: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
            jitter: false,
        }
    }
}

/// Main configuration for [`crate::ModpackInstaller`]
///
/// Every field has a default, so `Config::default()` works out of the box and
/// partial JSON documents fill in the rest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Concurrency, staging and HTTP client settings
    #[serde(default)]
    pub install: InstallConfig,

    /// Retry policy for artifact transfers
    #[serde(default)]
    pub retry: RetryConfig,

    /// Capacity of the broadcast event channel (default: 1000)
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            install: InstallConfig::default(),
            retry: RetryConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl Config {
    /// Parse a configuration from a JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        Self::from_json_str(&raw)
    }

    /// Reject settings the installer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.install.slots == 0 {
            return Err(Error::config("slots", "at least one download slot is required"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "max_attempts",
                "at least one attempt per artifact is required",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config(
                "event_channel_capacity",
                "event channel capacity must be non-zero",
            ));
        }
        let staging = Path::new(&self.install.staging_dir_name);
        if self.install.staging_dir_name.is_empty()
            || staging.components().count() != 1
            || staging.file_name().is_none()
        {
            return Err(Error::config(
                "staging_dir_name",
                format!(
                    "staging directory name must be a single path component, got {:?}",
                    self.install.staging_dir_name
                ),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_slots() -> usize {
    3
}

fn default_staging_dir_name() -> String {
    "downloading".into()
}

fn default_user_agent() -> String {
    concat!("modpack-dl/", env!("CARGO_PKG_VERSION")).into()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_event_channel_capacity() -> usize {
    1000
}

// Duration serialization helpers
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
