//! Bulk writer.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::client::{Executor, Transport};
use crate::config::Endpoint;
use crate::error::Result;
use crate::transform::{BulkAction, BulkInstruction};

/// Instructions built from one scroll page, flushed as one `_bulk` request.
#[derive(Debug, Default, Clone)]
pub struct BulkBatch {
    instructions: Vec<BulkInstruction>,
}

impl BulkBatch {
    /// Creates an empty batch.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            instructions: Vec::with_capacity(capacity),
        }
    }

    /// Appends an instruction.
    pub fn push(&mut self, instruction: BulkInstruction) {
        self.instructions.push(instruction);
    }

    /// Number of documents in the batch.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether the batch holds no instruction.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Bulk wire format: header line, body line per document, then the
    /// terminating blank line the API requires.
    ///
    /// # Errors
    ///
    /// Fails only if a document cannot be serialized.
    pub fn to_ndjson(&self) -> Result<String> {
        let mut body = String::new();
        for instruction in &self.instructions {
            body.push_str(&serde_json::to_string(&instruction.header)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&instruction.source)?);
            body.push('\n');
        }
        body.push('\n');
        Ok(body)
    }
}

impl FromIterator<BulkInstruction> for BulkBatch {
    fn from_iter<I: IntoIterator<Item = BulkInstruction>>(iter: I) -> Self {
        Self {
            instructions: iter.into_iter().collect(),
        }
    }
}

/// Per-batch result summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Documents sent.
    pub submitted: u64,
    /// Documents accepted by the destination.
    pub written: u64,
    /// Documents skipped because they already exist (create mode).
    pub conflicts: u64,
    /// Documents rejected for any other reason.
    pub failed: u64,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Submits batches to the destination `_bulk` endpoint.
pub struct BulkWriter<'a, T: Transport> {
    executor: &'a Executor<T>,
    destination: &'a Endpoint,
    action: BulkAction,
}

impl<'a, T: Transport> BulkWriter<'a, T> {
    /// Creates a writer for the destination cluster.
    pub fn new(executor: &'a Executor<T>, destination: &'a Endpoint, action: BulkAction) -> Self {
        Self {
            executor,
            destination,
            action,
        }
    }

    /// Sends one batch. Empty batches are skipped without a request.
    ///
    /// A failed submission is retried as a whole; items the server already
    /// applied on a failed attempt come back as conflicts in create mode.
    ///
    /// # Errors
    ///
    /// Only when the retry policy gives up.
    pub async fn write(&self, batch: &BulkBatch) -> Result<BulkOutcome> {
        if batch.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let submitted = batch.len() as u64;
        let body = batch.to_ndjson()?;
        let response = self
            .executor
            .post_ndjson(self.destination.cluster_path(&["_bulk"]), body)
            .await?;

        let outcome = match response {
            Some(value) => summarize(self.action, submitted, value),
            None => {
                warn!("Bulk endpoint of '{}' not found", self.destination.url);
                BulkOutcome {
                    submitted,
                    failed: submitted,
                    ..Default::default()
                }
            }
        };
        debug!("Bulk outcome: {:?}", outcome);

        Ok(outcome)
    }
}

fn summarize(action: BulkAction, submitted: u64, response: Value) -> BulkOutcome {
    let parsed: BulkResponse = match serde_json::from_value(response) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Unreadable bulk response: {}", e);
            return BulkOutcome {
                submitted,
                written: submitted,
                ..Default::default()
            };
        }
    };

    if !parsed.errors || parsed.items.is_empty() {
        return BulkOutcome {
            submitted,
            written: submitted,
            ..Default::default()
        };
    }

    let mut outcome = BulkOutcome {
        submitted,
        ..Default::default()
    };
    let mut first_failure: Option<Value> = None;

    for item in parsed.items.iter().flat_map(HashMap::values) {
        match (&item.error, item.status) {
            (None, _) => outcome.written += 1,
            (Some(_), 409) if action == BulkAction::Create => outcome.conflicts += 1,
            (Some(reason), _) => {
                outcome.failed += 1;
                if first_failure.is_none() {
                    first_failure = Some(reason.clone());
                }
            }
        }
    }

    if let Some(reason) = first_failure {
        warn!(
            "{} of {} documents rejected by the destination, first reason: {}",
            outcome.failed, submitted, reason
        );
    }

    outcome
}
