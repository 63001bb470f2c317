//! Scroll-based extraction of every document of the source index.
//!
//! An [`Extractor`] owns the one live scroll cursor of a run. Pages are pulled
//! with [`Extractor::next_page`] until an empty page comes back; the sequence
//! cannot be restarted.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{Executor, Transport};
use crate::config::Endpoint;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::retry::Attempt;
use crate::transform::DocumentRecord;

/// `_count` response.
#[derive(Debug, Deserialize)]
pub struct CountResponse {
    /// Matching documents.
    #[serde(default)]
    pub count: u64,
    /// Shard header.
    #[serde(rename = "_shards", default)]
    pub shards: ShardsInfo,
}

/// Shard header of a response.
#[derive(Debug, Default, Deserialize)]
pub struct ShardsInfo {
    /// Shards queried.
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Deserialize)]
struct ScrollResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: ScrollHits,
}

#[derive(Debug, Deserialize)]
struct ScrollHits {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<DocumentRecord>,
}

/// `hits.total`: a number before Elasticsearch 7, an object since.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Object { value } => *value,
        }
    }
}

/// Documents per shard for one scroll page; never below 1.
pub fn page_size(frame_size: usize, shards: u64) -> usize {
    let shards = usize::try_from(shards.max(1)).unwrap_or(usize::MAX);
    (frame_size / shards).max(1)
}

/// Reads `_count` of an index. `None` when the index does not exist.
///
/// # Errors
///
/// When the retry policy gives up or the response is not a count.
pub async fn count_documents<T: Transport>(
    executor: &Executor<T>,
    endpoint: &Endpoint,
) -> Result<Option<CountResponse>> {
    match executor.get(endpoint.path(&["_count"])).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Live scroll over the source index.
pub struct Extractor<'a, T: Transport> {
    executor: &'a Executor<T>,
    dialect: Dialect,
    source: &'a Endpoint,
    keep_alive: String,
    cursor: Option<String>,
    pending: Option<Vec<DocumentRecord>>,
    total: u64,
    exhausted: bool,
}

impl<'a, T: Transport> Extractor<'a, T> {
    /// Opens a scroll over every document of `source`.
    ///
    /// # Errors
    ///
    /// [`Error::Setup`] when the source index does not exist or the server
    /// returns no cursor; otherwise only when the retry policy gives up.
    pub async fn open(
        executor: &'a Executor<T>,
        dialect: Dialect,
        source: &'a Endpoint,
        frame_size: usize,
        keep_alive: &str,
    ) -> Result<Self> {
        let count = count_documents(executor, source)
            .await?
            .ok_or_else(|| Error::Setup(format!("source index '{source}' not found")))?;
        let size = page_size(frame_size, count.shards.total);
        debug!(
            "'{}' has {} shards, scrolling {} documents per shard",
            source, count.shards.total, size
        );

        let response = executor
            .request(&dialect.open_scroll(source, size, keep_alive))
            .await?
            .ok_or_else(|| Error::Setup(format!("cannot open a scroll on '{source}'")))?;
        let response: ScrollResponse = serde_json::from_value(response)?;

        let cursor = response
            .scroll_id
            .ok_or_else(|| Error::Setup(format!("no scroll id returned by '{source}'")))?;
        let total = response
            .hits
            .total
            .as_ref()
            .map_or(count.count, TotalHits::value);
        let pending = Some(response.hits.hits).filter(|hits| !hits.is_empty());

        info!("Scrolling {} documents from '{}'", total, source);

        Ok(Self {
            executor,
            dialect,
            source,
            keep_alive: keep_alive.to_string(),
            cursor: Some(cursor),
            pending,
            total,
            exhausted: false,
        })
    }

    /// Documents in the source when the scroll was opened.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Current cursor, if the scroll is still live.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Next page of documents, `None` once the scroll is exhausted.
    ///
    /// # Errors
    ///
    /// [`Error::ScrollExpired`] when the server no longer knows the cursor.
    pub async fn next_page(&mut self) -> Result<Option<Vec<DocumentRecord>>> {
        if self.exhausted {
            return Ok(None);
        }
        if let Some(page) = self.pending.take() {
            return Ok(Some(page));
        }

        let cursor = match self.cursor.as_deref() {
            Some(cursor) => cursor,
            None => {
                self.exhausted = true;
                return Ok(None);
            }
        };

        let request = self.dialect.continue_scroll(self.source, cursor, &self.keep_alive);
        let response = self
            .executor
            .request(&request)
            .await?
            .ok_or_else(|| Error::ScrollExpired(self.source.to_string()))?;
        let response: ScrollResponse = serde_json::from_value(response)?;

        if let Some(cursor) = response.scroll_id {
            self.cursor = Some(cursor);
        }

        if response.hits.hits.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        Ok(Some(response.hits.hits))
    }

    /// Releases the server-side scroll context, best effort.
    ///
    /// Failures are only logged; an unreleased context expires on its own
    /// after the keep-alive.
    pub async fn release(mut self) {
        let Some(cursor) = self.cursor.take() else {
            return;
        };

        let request = self.dialect.clear_scroll(self.source, &cursor);
        match self.executor.try_once(&request).await {
            Attempt::Success(_) | Attempt::Absent => debug!("Scroll on '{}' released", self.source),
            Attempt::Retry(e) => warn!("Could not release scroll on '{}': {}", self.source, e),
        }
    }
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
