//! Ingestion pipeline
//!
//! Streams one file through the enricher and the batch assembler and submits
//! each completed batch before reading further:
//! 1. Read the header and check that it names the document id column
//! 2. Enrich every data line, stamping the index of the open batch
//! 3. Submit each full batch, then the final partial one
//!
//! Any fatal error aborts the run; there is no retry.

use crate::batch::{Batch, BatchAssembler};
use crate::config::{IndexConfig, IngestConfig};
use crate::error::{IngestError, Result};
use crate::index::IndexingService;
use crate::reader::EdrReader;
use crate::record::RecordEnricher;
use crate::submit::BulkSubmitter;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::io::AsyncRead;
use tracing::{debug, info};

/// Totals for one completed run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub batches_submitted: u64,
    pub records_read: u64,
    pub documents_indexed: u64,
    pub item_errors: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Streaming,
    Done,
}

pub struct IngestPipeline<'a, S: IndexingService + ?Sized> {
    ingest: &'a IngestConfig,
    index: &'a IndexConfig,
    service: &'a S,
}

impl<'a, S: IndexingService + ?Sized> IngestPipeline<'a, S> {
    pub fn new(ingest: &'a IngestConfig, index: &'a IndexConfig, service: &'a S) -> Self {
        Self {
            ingest,
            index,
            service,
        }
    }

    /// Load the configured input file.
    pub async fn run(&self) -> Result<PipelineStats> {
        info!(file = %self.ingest.input_path.display(), "Opening input file");
        let reader = EdrReader::open(self.ingest.input_path(), self.ingest.delimiter).await?;
        self.run_reader(reader).await
    }

    /// Load from an already opened reader.
    pub async fn run_reader<R>(&self, mut reader: EdrReader<R>) -> Result<PipelineStats>
    where
        R: AsyncRead + Unpin + Send,
    {
        let start = Instant::now();
        let file_name = self.ingest.file_name();

        let header = reader.read_header().await?;
        if !header.contains(&self.index.id_field) {
            return Err(IngestError::MissingDocumentId {
                field: self.index.id_field.clone(),
            });
        }
        debug!(columns = header.len(), "Header read");

        let enricher = RecordEnricher::new(header, file_name.clone());
        let mut assembler =
            BatchAssembler::new(file_name, self.ingest.batch_size, self.ingest.batch_scale);
        let submitter = BulkSubmitter::new(self.service, self.index, self.ingest.batch_size);

        let mut stats = PipelineStats::default();
        let mut state = DriverState::Streaming;

        while state == DriverState::Streaming {
            match reader.next_line().await? {
                Some(line) => {
                    let record = enricher.enrich(line, assembler.current_index(), Utc::now())?;
                    stats.records_read += 1;

                    if let Some(batch) = assembler.push(record) {
                        self.submit(&submitter, batch, &mut stats).await?;
                    }
                },
                None => {
                    if let Some(batch) = assembler.finish() {
                        self.submit(&submitter, batch, &mut stats).await?;
                    }
                    state = DriverState::Done;
                },
            }
        }

        stats.duration = start.elapsed();

        info!(
            "Ingestion complete: {} records in {} batches, {} indexed, {} rejected in {:.2}s",
            stats.records_read,
            stats.batches_submitted,
            stats.documents_indexed,
            stats.item_errors,
            stats.duration.as_secs_f64()
        );

        Ok(stats)
    }

    async fn submit(
        &self,
        submitter: &BulkSubmitter<'_, S>,
        batch: Batch,
        stats: &mut PipelineStats,
    ) -> Result<()> {
        debug!(
            batch = batch.index(),
            records = batch.len(),
            scale_slot = batch.scale_slot(),
            "Submitting batch"
        );

        let result = submitter.submit(&batch).await?;

        stats.batches_submitted += 1;
        stats.documents_indexed += result.success_count;
        stats.item_errors += result.errors.len() as u64;
        Ok(())
    }
}
