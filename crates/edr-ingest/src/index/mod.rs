//! Indexing service collaborator
//!
//! The pipeline talks to the search cluster only through [`IndexingService`].
//! [`EsClient`] is the HTTP implementation; tests substitute in-memory ones.

pub mod client;
pub mod schema;
pub mod sigv4;

pub use client::{ClusterInfo, EsClient};
pub use sigv4::{AwsCredentials, RequestSigner};

use crate::error::Result;
use crate::record::EnrichedRecord;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Operations the ingestion core needs from a search cluster.
///
/// Implementations return `Err` only for failures of a request as a whole
/// (transport, authentication, non-2xx responses). Rejections of individual
/// documents inside a bulk request are reported through [`BulkOutcome`].
#[async_trait]
pub trait IndexingService: Send + Sync {
    /// Checks whether `index` exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Creates `index` with the given settings and mappings.
    async fn create_index(&self, index: &str, body: &serde_json::Value) -> Result<()>;

    /// Submits `actions`, split into requests of at most `chunk_size` actions.
    async fn bulk(&self, actions: &[IndexAction], chunk_size: usize) -> Result<BulkOutcome>;
}

/// One `index` (create-or-replace by id) bulk action.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexAction {
    pub index: String,
    pub doc_type: Option<String>,
    pub id: String,
    pub source: EnrichedRecord,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id")]
    id: &'a str,
}

#[derive(Serialize)]
struct ActionLine<'a> {
    index: ActionMeta<'a>,
}

impl IndexAction {
    /// Append the action line and the document line, each newline-terminated.
    pub fn write_ndjson(&self, out: &mut Vec<u8>) -> serde_json::Result<()> {
        let line = ActionLine {
            index: ActionMeta {
                index: &self.index,
                doc_type: self.doc_type.as_deref(),
                id: &self.id,
            },
        };

        serde_json::to_writer(&mut *out, &line)?;
        out.push(b'\n');
        serde_json::to_writer(&mut *out, &self.source)?;
        out.push(b'\n');
        Ok(())
    }
}

/// Encode actions as a `_bulk` request body.
pub fn encode_ndjson(actions: &[IndexAction]) -> serde_json::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(actions.len() * 512);
    for action in actions {
        action.write_ndjson(&mut body)?;
    }
    Ok(body)
}

/// Result of a bulk submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkOutcome {
    /// Documents the cluster accepted
    pub success_count: u64,

    /// Documents the cluster rejected
    pub errors: Vec<ItemIndexError>,
}

impl BulkOutcome {
    /// Fold the outcome of a later chunk into this one.
    pub fn merge(&mut self, other: BulkOutcome) {
        self.success_count += other.success_count;
        self.errors.extend(other.errors);
    }

    pub fn total_count(&self) -> u64 {
        self.success_count + self.errors.len() as u64
    }

    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A document rejected inside an otherwise accepted bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIndexError {
    /// Position of the action within the submission
    pub position: usize,

    /// Document id, when the cluster echoed it back
    pub doc_id: Option<String>,

    /// HTTP status reported for this item
    pub status: u16,

    /// Error type (e.g., "mapper_parsing_exception")
    pub error_type: String,

    /// Human-readable reason
    pub reason: String,
}

impl fmt::Display for ItemIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "item {} (id {}) rejected with status {}: {}: {}",
            self.position,
            self.doc_id.as_deref().unwrap_or("-"),
            self.status,
            self.error_type,
            self.reason
        )
    }
}
