//! Server version probe.
//!
//! The scroll API changed shape with Elasticsearch 5; the source cluster is
//! asked once for its version and the answer picks the [`Dialect`] used for
//! the whole extraction.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::client::{Executor, Transport};
use crate::config::Endpoint;
use crate::dialect::Dialect;
use crate::error::{Error, Result};

/// First major version served by the modern scroll dialect.
pub const MODERN_MAJOR: u64 = 5;

/// Dot-separated numeric version, e.g. `6.8.23`.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// Creates a version from its numeric components.
    pub fn new(parts: Vec<u64>) -> Self {
        Self { parts }
    }

    /// Major component (0 when empty).
    pub fn major(&self) -> u64 {
        self.parts.first().copied().unwrap_or(0)
    }

    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = Error;

    /// Parses `X.Y.Z`; a pre-release suffix such as `-SNAPSHOT` or
    /// `-alpha1` is ignored.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let numeric = trimmed.split('-').next().unwrap_or_default();
        if numeric.is_empty() {
            return Err(Error::VersionParse(format!("'{s}' is empty")));
        }

        let parts = numeric
            .split('.')
            .map(|part| {
                part.parse::<u64>().map_err(|_| {
                    Error::VersionParse(format!("'{s}' has non-numeric component '{part}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { parts })
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    /// Component-wise; missing trailing components count as 0.
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        f.write_str(&text.join("."))
    }
}

impl Dialect {
    /// Dialect spoken by a server of the given version.
    pub fn for_version(version: &Version) -> Self {
        if *version >= Version::new(vec![MODERN_MAJOR]) {
            Self::Modern
        } else {
            Self::Legacy
        }
    }
}

/// Reads the version number from a cluster root response.
///
/// # Errors
///
/// Returns [`Error::VersionParse`] when `version.number` is missing or
/// malformed.
pub fn version_from_root(root: &serde_json::Value) -> Result<Version> {
    root.pointer("/version/number")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::VersionParse(format!("no version.number in {root}")))?
        .parse()
}

/// Asks the source cluster for its version and selects the scroll dialect.
///
/// # Errors
///
/// Fails fast when the root endpoint is missing or its version is unparsable.
pub async fn probe_dialect<T: Transport>(
    executor: &Executor<T>,
    endpoint: &Endpoint,
) -> Result<Dialect> {
    let root = executor
        .get(endpoint.cluster_path(&[""]))
        .await?
        .ok_or_else(|| Error::Setup(format!("'{}' did not answer the version probe", endpoint.url)))?;

    let version = version_from_root(&root)?;
    let dialect = Dialect::for_version(&version);
    info!("Source cluster version {} uses the {} scroll dialect", version, dialect);

    Ok(dialect)
}
