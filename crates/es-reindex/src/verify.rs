//! Post-transfer document count comparison.

use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::client::{Executor, Transport};
use crate::config::Endpoint;
use crate::error::Result;
use crate::extractor::count_documents;

/// Last observed document counts of both indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountReport {
    /// Source document count.
    pub source: u64,
    /// Destination document count.
    pub destination: u64,
    /// Whether the counts matched before the timeout.
    pub converged: bool,
    /// Whether both counts were read at least once.
    pub observed: bool,
}

impl CountReport {
    /// Whether both counts were read and are equal.
    pub fn is_equal(&self) -> bool {
        self.observed && self.source == self.destination
    }
}

impl fmt::Display for CountReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.observed {
            write!(f, "? == ? (NOT EQUAL)!")
        } else if self.is_equal() {
            write!(f, "{} == {} (equals).", self.source, self.destination)
        } else {
            write!(f, "{} == {} (NOT EQUAL)!", self.source, self.destination)
        }
    }
}

/// Polls both counts until they match or the time budget runs out.
pub struct Verifier<'a, T: Transport> {
    executor: &'a Executor<T>,
    source: &'a Endpoint,
    destination: &'a Endpoint,
    timeout: Duration,
    interval: Duration,
}

impl<'a, T: Transport> Verifier<'a, T> {
    /// Creates a verifier.
    pub fn new(
        executor: &'a Executor<T>,
        source: &'a Endpoint,
        destination: &'a Endpoint,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            executor,
            source,
            destination,
            timeout,
            interval,
        }
    }

    /// Compares the counts. Never fails: on timeout, or if a count cannot be
    /// read, the last observed counts are returned with `converged = false`.
    pub async fn verify(&self) -> CountReport {
        let mut last = CountReport::default();

        let polled = timeout(self.timeout, async {
            loop {
                match self.counts().await {
                    Ok((source, destination)) => {
                        last = CountReport {
                            source,
                            destination,
                            converged: false,
                            observed: true,
                        };
                        if source == destination {
                            return;
                        }
                        debug!("Counts differ: {} != {}", source, destination);
                    }
                    Err(e) => warn!("Count comparison failed: {}", e),
                }
                sleep(self.interval).await;
            }
        })
        .await;

        match polled {
            Ok(()) => CountReport {
                converged: true,
                ..last
            },
            Err(_) => {
                warn!(
                    "Counts did not converge within {:?}: {}",
                    self.timeout, last
                );
                last
            }
        }
    }

    async fn counts(&self) -> Result<(u64, u64)> {
        let source = count_documents(self.executor, self.source).await?;
        let destination = count_documents(self.executor, self.destination).await?;
        Ok((
            source.map_or(0, |c| c.count),
            destination.map_or(0, |c| c.count),
        ))
    }
}
