//! End-to-end run: connect, prepare the index, ingest
//!
//! Each stage gates the next; a failure carries the stage it happened in so
//! the binary can pick the exit code.

use crate::config::{IndexConfig, IngestConfig};
use crate::error::IngestError;
use crate::index::schema::edr_index_body;
use crate::index::{EsClient, IndexingService, RequestSigner};
use crate::pipeline::{IngestPipeline, PipelineStats};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Setup,
    Connect,
    IndexSetup,
    Ingest,
}

impl RunStage {
    pub fn exit_code(self) -> i32 {
        match self {
            RunStage::Setup => 2,
            RunStage::Connect => 3,
            RunStage::IndexSetup => 4,
            RunStage::Ingest => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Setup => "setup",
            RunStage::Connect => "connect",
            RunStage::IndexSetup => "index setup",
            RunStage::Ingest => "ingest",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal error and the stage that raised it
#[derive(Error, Debug)]
#[error("{stage} failed")]
pub struct RunFailure {
    pub stage: RunStage,
    #[source]
    pub error: IngestError,
}

impl RunFailure {
    pub fn new(stage: RunStage, error: IngestError) -> Self {
        Self { stage, error }
    }

    pub fn exit_code(&self) -> i32 {
        self.stage.exit_code()
    }
}

trait AtStage<T> {
    fn at(self, stage: RunStage) -> std::result::Result<T, RunFailure>;
}

impl<T> AtStage<T> for crate::error::Result<T> {
    fn at(self, stage: RunStage) -> std::result::Result<T, RunFailure> {
        self.map_err(|error| RunFailure::new(stage, error))
    }
}

/// Create the index with the EDR mappings unless it already exists.
///
/// Returns `true` when the index was created.
pub async fn ensure_index<S: IndexingService + ?Sized>(
    service: &S,
    config: &IndexConfig,
) -> crate::error::Result<bool> {
    if service.index_exists(&config.index_name).await? {
        info!(index = %config.index_name, "Index already exists");
        return Ok(false);
    }

    let body = edr_index_body(config.doc_type.as_deref());
    service.create_index(&config.index_name, &body).await?;
    info!(index = %config.index_name, "Index created");
    Ok(true)
}

/// Prepare the index and ingest through an existing service.
pub async fn run_with_service<S: IndexingService + ?Sized>(
    service: &S,
    ingest: &IngestConfig,
    index: &IndexConfig,
) -> std::result::Result<PipelineStats, RunFailure> {
    ensure_index(service, index).await.at(RunStage::IndexSetup)?;

    IngestPipeline::new(ingest, index, service)
        .run()
        .await
        .at(RunStage::Ingest)
}

/// Validate configuration, connect with credentials from the environment,
/// prepare the index and ingest.
pub async fn run(
    ingest: &IngestConfig,
    index: &IndexConfig,
) -> std::result::Result<PipelineStats, RunFailure> {
    ingest.validate().at(RunStage::Setup)?;
    index.validate().at(RunStage::Setup)?;
    let signer = RequestSigner::from_env().at(RunStage::Setup)?;

    info!(
        file = %ingest.input_path.display(),
        batch_size = ingest.batch_size,
        batch_scale = ingest.batch_scale,
        endpoint = %index.endpoint,
        region = signer.region(),
        "Starting EDR load"
    );

    let client = EsClient::connect(index, Some(signer)).await.at(RunStage::Connect)?;

    run_with_service(&client, ingest, index).await
}
