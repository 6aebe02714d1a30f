//! Bulk batcher
//!
//! Runs an ordered collection of writes and reports one [`BulkItemResult`]
//! per input item, in input order. Failures are recorded per item and never
//! abort the rest of the batch.
//!
//! Two modes give the same caller-visible shape:
//! - [`BulkMode::PerItem`]: one logical call per item, up to `concurrency`
//!   in flight
//! - [`BulkMode::Native`]: items are chunked into NDJSON `PATCH` requests
//!   against a collection endpoint that answers with one status line per item

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use pimsdk_domain::constants::{DEFAULT_BULK_BATCH_SIZE, DEFAULT_BULK_CONCURRENCY};
use pimsdk_domain::{BulkItemResult, BulkStatusLine, PimError, RequestBody, RequestDescriptor};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::dispatcher::Dispatcher;

const MISSING_STATUS: &str = "no per-item status returned";

/// One write of a bulk operation
#[derive(Debug, Clone)]
pub struct BulkItem {
    /// Caller-facing key echoed in the result
    pub identifier: String,
    /// Request for per-item mode; its JSON body is the NDJSON line in native mode
    pub operation: RequestDescriptor,
}

impl BulkItem {
    pub fn new(identifier: impl Into<String>, operation: RequestDescriptor) -> Self {
        Self { identifier: identifier.into(), operation }
    }
}

/// How a bulk operation reaches the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkMode {
    PerItem,
    Native { collection_path: String },
}

impl BulkMode {
    pub fn native(collection_path: impl Into<String>) -> Self {
        Self::Native { collection_path: collection_path.into() }
    }
}

/// Executes bulk operations over the dispatcher
#[derive(Clone)]
pub struct BulkBatcher {
    dispatcher: Arc<Dispatcher>,
    batch_size: usize,
    concurrency: usize,
}

impl BulkBatcher {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            batch_size: DEFAULT_BULK_BATCH_SIZE,
            concurrency: DEFAULT_BULK_CONCURRENCY,
        }
    }

    /// Items per native request (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Logical calls in flight at once (at least 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Execute every item and return their results in input order.
    #[instrument(skip(self, items), fields(items = items.len(), mode = ?mode))]
    pub async fn execute_bulk(&self, items: Vec<BulkItem>, mode: &BulkMode) -> Vec<BulkItemResult> {
        if items.is_empty() {
            return Vec::new();
        }
        let results = match mode {
            BulkMode::PerItem => self.per_item(items).await,
            BulkMode::Native { collection_path } => self.native(items, collection_path).await,
        };
        let failed = results.iter().filter(|r| !r.is_success()).count();
        debug!(total = results.len(), failed, "bulk operation finished");
        results
    }

    async fn per_item(&self, items: Vec<BulkItem>) -> Vec<BulkItemResult> {
        stream::iter(items)
            .map(|item| async move {
                match self.dispatcher.execute(&item.operation).await {
                    Ok(outcome) => BulkItemResult::new(item.identifier, outcome.status, None),
                    Err(err) => BulkItemResult::from_error(item.identifier, &err),
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn native(&self, items: Vec<BulkItem>, collection_path: &str) -> Vec<BulkItemResult> {
        let chunks: Vec<Vec<BulkItem>> =
            items.chunks(self.batch_size).map(<[BulkItem]>::to_vec).collect();

        stream::iter(chunks)
            .map(|chunk| self.native_chunk(chunk, collection_path))
            .buffered(self.concurrency)
            .flat_map(stream::iter)
            .collect()
            .await
    }

    async fn native_chunk(&self, chunk: Vec<BulkItem>, collection_path: &str) -> Vec<BulkItemResult> {
        // Items without a JSON body cannot become a line; they are answered
        // locally and the rest of the chunk is still sent.
        let mut slots: Vec<Option<BulkItemResult>> = vec![None; chunk.len()];
        let mut lines = Vec::with_capacity(chunk.len());
        let mut line_owner = Vec::with_capacity(chunk.len());
        for (index, item) in chunk.iter().enumerate() {
            match item.operation.request_body() {
                RequestBody::Json(value) => {
                    lines.push(value.clone());
                    line_owner.push(index);
                }
                _ => {
                    let err = PimError::invalid_field(
                        item.identifier.clone(),
                        "native bulk items need a JSON body",
                    );
                    slots[index] = Some(BulkItemResult::from_error(&item.identifier, &err));
                }
            }
        }

        if !lines.is_empty() {
            let sent = line_owner.len();
            let request = RequestDescriptor::patch(collection_path).ndjson(lines);
            let statuses = match self.dispatcher.execute(&request).await {
                Ok(outcome) => BulkStatusLine::parse_ndjson(&outcome.text()),
                Err(err) => Err(err),
            };

            match statuses {
                Ok(statuses) => {
                    let by_line = index_status_lines(statuses, &chunk, &line_owner);
                    for (position, &index) in line_owner.iter().enumerate() {
                        let identifier = &chunk[index].identifier;
                        slots[index] = Some(match by_line.get(&(position + 1)) {
                            Some(status) => BulkItemResult::new(
                                identifier.clone(),
                                status.status_code,
                                status.message.clone(),
                            ),
                            None => {
                                BulkItemResult::new(identifier.clone(), 0, Some(MISSING_STATUS.into()))
                            }
                        });
                    }
                }
                Err(err) => {
                    warn!(items = sent, error = %err, "bulk request failed for the whole chunk");
                    for &index in &line_owner {
                        slots[index] = Some(BulkItemResult::from_error(&chunk[index].identifier, &err));
                    }
                }
            }
        }

        chunk
            .into_iter()
            .zip(slots)
            .map(|(item, slot)| {
                slot.unwrap_or_else(|| BulkItemResult::new(item.identifier, 0, Some(MISSING_STATUS.into())))
            })
            .collect()
    }
}

/// Key status lines by 1-based request line.
///
/// Lines the server numbered are taken as-is; unnumbered-but-keyed lines
/// (line `0`) are matched on the item's identifier.
fn index_status_lines(
    statuses: Vec<BulkStatusLine>,
    chunk: &[BulkItem],
    line_owner: &[usize],
) -> HashMap<usize, BulkStatusLine> {
    let mut by_line = HashMap::with_capacity(statuses.len());
    for status in statuses {
        let line = if status.line > 0 {
            Some(status.line)
        } else {
            status.key().and_then(|key| {
                line_owner.iter().position(|&index| chunk[index].identifier == key).map(|p| p + 1)
            })
        };
        if let Some(line) = line {
            by_line.entry(line).or_insert(status);
        }
    }
    by_line
}

/// NDJSON line for an upsert keyed by `field`, merging the key into `payload`.
pub(crate) fn keyed_line(field: &str, key: &str, payload: Value) -> Value {
    let mut payload = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".into(), other);
            map
        }
    };
    payload.insert(field.to_string(), Value::String(key.to_string()));
    Value::Object(payload)
}
