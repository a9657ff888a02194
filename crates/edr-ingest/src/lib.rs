//! EDR Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch loader for Event Detail Record flat files.
//!
//! # Overview
//!
//! A delimited EDR file is streamed line by line. Each line is enriched with
//! provenance fields (source file, batch id, processing time, partition key,
//! normalized event timestamps), grouped into fixed-size batches and sent to
//! an Elasticsearch / Amazon OpenSearch Service cluster through the `_bulk`
//! API.
//!
//! - [`timestamp`]: event timestamp parsing and normalization
//! - [`record`]: header handling and record enrichment
//! - [`batch`]: batch assembly
//! - [`submit`]: bulk submission of a batch
//! - [`pipeline`]: the streaming driver
//! - [`index`]: the indexing service trait, its HTTP client and the index schema
//! - [`runner`]: connect, prepare the index, ingest
//!
//! # Example
//!
//! ```no_run
//! use edr_ingest::config::{IndexConfig, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ingest = IngestConfig::new("edr_20170101.csv", 1000, 1);
//!     let index = IndexConfig::new("search-edr.us-east-1.es.amazonaws.com");
//!
//!     let stats = edr_ingest::runner::run(&ingest, &index).await?;
//!     println!("{} documents indexed", stats.documents_indexed);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod runner;
pub mod submit;
pub mod timestamp;

pub use error::{IngestError, Result};
