//! Configuration types for es-reindex.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::retry::RetryConfig;

/// Base URL used when an endpoint specification has no URL part.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

/// One side of the copy: a cluster base URL and an index name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Cluster base URL, without trailing slash.
    pub url: String,
    /// Index name.
    pub index: String,
}

impl Endpoint {
    /// Creates an endpoint, normalizing the trailing slash of the URL.
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            index: index.into(),
        }
    }

    /// Parses `[url/]index`.
    ///
    /// The index is whatever follows the last `/`; a specification without
    /// `/` is a bare index name on `default_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Usage`] when the index part is empty.
    pub fn parse(spec: &str, default_url: &str) -> Result<Self> {
        let spec = spec.strip_suffix('/').unwrap_or(spec);

        let (url, index) = match spec.rsplit_once('/') {
            Some((url, index)) => (url, index),
            None => (default_url, spec),
        };

        if index.is_empty() {
            return Err(Error::Usage(format!(
                "missing index name in '{spec}', expected [url/]index"
            )));
        }
        if url.is_empty() {
            return Err(Error::Usage(format!(
                "missing URL in '{spec}', expected [url/]index"
            )));
        }

        Ok(Self::new(url, index))
    }

    /// Index URL with extra path segments appended.
    pub fn path(&self, segments: &[&str]) -> String {
        let mut url = format!("{}/{}", self.url, self.index);
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// Cluster-level URL with extra path segments appended.
    pub fn cluster_path(&self, segments: &[&str]) -> String {
        let mut url = self.url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.url, self.index)
    }
}

/// Main reindex configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexConfig {
    /// Index documents are read from.
    pub source: Endpoint,
    /// Index documents are written to.
    pub destination: Endpoint,
    /// Copy options.
    #[serde(default)]
    pub options: ReindexOptions,
}

/// Copy options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReindexOptions {
    /// Documents fetched per scroll page, split across shards.
    pub frame_size: usize,
    /// Delete the destination index first when it exists.
    pub remove_destination: bool,
    /// Overwrite documents that already exist in the destination.
    pub update_existing: bool,
    /// Scroll keep-alive, in Elasticsearch time units.
    pub scroll_keep_alive: String,
    /// Upper bound for the final count comparison, in seconds.
    pub verify_timeout_secs: u64,
    /// Pause between two count comparisons, in seconds.
    pub verify_interval_secs: u64,
    /// Per-request timeout; requests may take forever when unset.
    pub request_timeout_secs: Option<u64>,
    /// Retry policy for every request.
    pub retry: RetryConfig,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            frame_size: default_frame_size(),
            remove_destination: false,
            update_existing: false,
            scroll_keep_alive: "10m".to_string(),
            verify_timeout_secs: 60,
            verify_interval_secs: 1,
            request_timeout_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

impl ReindexOptions {
    /// Final verification budget.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    /// Final verification polling interval.
    pub fn verify_interval(&self) -> Duration {
        Duration::from_secs(self.verify_interval_secs)
    }

    /// Per-request timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn default_frame_size() -> usize {
    1000
}

impl ReindexConfig {
    /// Creates a configuration with default options.
    pub fn new(source: Endpoint, destination: Endpoint) -> Self {
        Self {
            source,
            destination,
            options: ReindexOptions::default(),
        }
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&content)?;
        for endpoint in [&mut config.source, &mut config.destination] {
            *endpoint = Endpoint::new(endpoint.url.as_str(), endpoint.index.as_str());
        }
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        for endpoint in [&self.source, &self.destination] {
            if endpoint.index.is_empty() {
                return Err(Error::Config("index name cannot be empty".to_string()));
            }
            if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "Invalid URL scheme in '{}'. Allowed: http, https",
                    endpoint.url
                )));
            }
        }
        if self.options.frame_size == 0 {
            return Err(Error::Config(
                "frame size must be greater than 0".to_string(),
            ));
        }
        if self.options.scroll_keep_alive.trim().is_empty() {
            return Err(Error::Config(
                "scroll keep-alive cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// One-line description of the copy, shown before asking for confirmation.
    pub fn describe_plan(&self) -> String {
        let suffix = if self.options.remove_destination {
            " with rewriting destination mapping!"
        } else if self.options.update_existing {
            " with updating existing documents!"
        } else {
            "."
        };
        format!(
            "Copying '{}' to '{}'{}",
            self.source, self.destination, suffix
        )
    }
}
