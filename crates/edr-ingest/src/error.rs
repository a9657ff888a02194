//! Error types for EDR ingestion
//!
//! Every variant of [`IngestError`] is fatal: it aborts the run and bubbles up
//! to the caller. Rejections of individual documents inside an otherwise
//! successful bulk request are not errors at this level; they are reported as
//! [`ItemIndexError`](crate::index::ItemIndexError) values inside a
//! [`SubmissionResult`](crate::submit::SubmissionResult).

use crate::timestamp::TimestampError;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Fatal ingestion error
#[derive(Error, Debug)]
pub enum IngestError {
    /// Source timestamp does not follow `YYYY/MM/DD HH:MM:SS.ffffff`
    #[error("Malformed event timestamp on line {line}: {source}")]
    MalformedTimestamp {
        line: u64,
        #[source]
        source: TimestampError,
    },

    /// Data line carries fewer fields than the partition key needs
    #[error("Record on line {line} is too short: {found} fields, at least {required} required")]
    RecordTooShort {
        line: u64,
        found: usize,
        required: usize,
    },

    /// Data line does not line up with the header columns
    #[error("Record on line {line} has {found} fields but the header declares {expected}")]
    ColumnMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Input file has no header line
    #[error("Input file '{0}' is empty: a header line is required")]
    MissingHeader(String),

    /// Document id column absent from the header or a record
    #[error("Document id field '{field}' is missing")]
    MissingDocumentId { field: String },

    /// Bulk request rejected as a whole by the indexing service
    #[error("Bulk submission failed: {0}")]
    SubmissionTransport(String),

    /// Could not establish a session with the indexing service
    #[error("Connection to indexing service failed: {0}")]
    Connection(String),

    /// Index existence check or creation failed
    #[error("Index setup failed: {0}")]
    IndexSetup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read delimited input: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IngestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a bulk transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::SubmissionTransport(msg.into())
    }

    /// Create an index setup error
    pub fn index_setup(msg: impl Into<String>) -> Self {
        Self::IndexSetup(msg.into())
    }

    /// True when the error was caused by the content of the input file
    /// rather than by the environment or the indexing service.
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedTimestamp { .. }
                | Self::RecordTooShort { .. }
                | Self::ColumnMismatch { .. }
                | Self::MissingHeader(_)
                | Self::MissingDocumentId { .. }
                | Self::Csv(_)
        )
    }
}
