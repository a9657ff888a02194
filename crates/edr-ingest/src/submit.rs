//! Bulk submission of assembled batches

use crate::batch::Batch;
use crate::config::IndexConfig;
use crate::error::{IngestError, Result};
use crate::index::{IndexAction, IndexingService, ItemIndexError};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Outcome of submitting one batch
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    pub batch_index: u64,
    pub success_count: u64,
    pub errors: Vec<ItemIndexError>,
    pub duration: Duration,
}

impl SubmissionResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Turns batches into `index` actions and hands them to the indexing service.
pub struct BulkSubmitter<'a, S: IndexingService + ?Sized> {
    service: &'a S,
    config: &'a IndexConfig,
    chunk_size: usize,
}

impl<'a, S: IndexingService + ?Sized> BulkSubmitter<'a, S> {
    /// `chunk_size` is the largest number of actions per bulk request.
    pub fn new(service: &'a S, config: &'a IndexConfig, chunk_size: usize) -> Self {
        Self {
            service,
            config,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn build_actions(&self, batch: &Batch) -> Result<Vec<IndexAction>> {
        batch
            .records()
            .iter()
            .map(|record| {
                let id = record
                    .get(&self.config.id_field)
                    .ok_or_else(|| IngestError::MissingDocumentId {
                        field: self.config.id_field.clone(),
                    })?;

                Ok(IndexAction {
                    index: self.config.index_name.clone(),
                    doc_type: self.config.doc_type.clone(),
                    id: id.to_string(),
                    source: record.clone(),
                })
            })
            .collect()
    }

    /// Submit one batch.
    ///
    /// Fails only when the request itself fails; documents the cluster
    /// rejects are logged and returned in the result.
    pub async fn submit(&self, batch: &Batch) -> Result<SubmissionResult> {
        let start = Instant::now();
        let actions = self.build_actions(batch)?;

        let outcome = self.service.bulk(&actions, self.chunk_size).await?;

        for item in &outcome.errors {
            error!(
                batch = batch.index(),
                position = item.position,
                doc_id = item.doc_id.as_deref().unwrap_or("-"),
                status = item.status,
                error_type = %item.error_type,
                reason = %item.reason,
                "Document rejected"
            );
        }

        let result = SubmissionResult {
            batch_index: batch.index(),
            success_count: outcome.success_count,
            errors: outcome.errors,
            duration: start.elapsed(),
        };

        info!(
            batch = result.batch_index,
            success = result.success_count,
            errors = result.error_count(),
            "Batch {} submitted",
            result.batch_index
        );

        Ok(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::batch::BatchAssembler;
    use crate::index::BulkOutcome;
    use crate::record::{EnrichedRecord, FieldValue};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<(Vec<IndexAction>, usize)>>,
        reject_id: Option<String>,
    }

    #[async_trait]
    impl IndexingService for RecordingService {
        async fn index_exists(&self, _index: &str) -> Result<bool> {
            Ok(true)
        }

        async fn create_index(&self, _index: &str, _body: &serde_json::Value) -> Result<()> {
            Ok(())
        }

        async fn bulk(&self, actions: &[IndexAction], chunk_size: usize) -> Result<BulkOutcome> {
            self.calls.lock().unwrap().push((actions.to_vec(), chunk_size));

            let mut outcome = BulkOutcome::default();
            for (position, action) in actions.iter().enumerate() {
                if self.reject_id.as_deref() == Some(action.id.as_str()) {
                    outcome.errors.push(ItemIndexError {
                        position,
                        doc_id: Some(action.id.clone()),
                        status: 400,
                        error_type: "mapper_parsing_exception".to_string(),
                        reason: "bad value".to_string(),
                    });
                } else {
                    outcome.success_count += 1;
                }
            }
            Ok(outcome)
        }
    }

    fn batch(ids: &[&str]) -> Batch {
        let mut assembler = BatchAssembler::new("edr.csv", ids.len(), 1);
        let mut batches: Vec<Batch> = ids
            .iter()
            .filter_map(|id| {
                assembler.push(EnrichedRecord::from_pairs(vec![(
                    "TRANSACTION_ID".to_string(),
                    FieldValue::from(*id),
                )]))
            })
            .collect();
        batches.remove(0)
    }

    #[test]
    fn test_actions_use_index_config() {
        let service = RecordingService::default();
        let config = IndexConfig::new("localhost");
        let submitter = BulkSubmitter::new(&service, &config, 10);

        let actions = submitter.build_actions(&batch(&["TX-1", "TX-2"])).unwrap();

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].index, "bl_edr");
        assert_eq!(actions[0].doc_type.as_deref(), Some("edr"));
        assert_eq!(actions[1].id, "TX-2");
    }

    #[test]
    fn test_missing_id_field() {
        let service = RecordingService::default();
        let config = IndexConfig::new("localhost").with_id_field("SESSION_ID");
        let submitter = BulkSubmitter::new(&service, &config, 10);

        let err = submitter.build_actions(&batch(&["TX-1"])).unwrap_err();
        assert!(matches!(err, IngestError::MissingDocumentId { ref field } if field == "SESSION_ID"));
    }

    #[tokio::test]
    async fn test_submit_passes_chunk_size() {
        let service = RecordingService::default();
        let config = IndexConfig::new("localhost");
        let submitter = BulkSubmitter::new(&service, &config, 3);

        let result = submitter.submit(&batch(&["TX-1", "TX-2", "TX-3"])).await.unwrap();

        assert_eq!(result.success_count, 3);
        assert_eq!(result.error_count(), 0);
        let calls = service.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 3);
    }

    #[tokio::test]
    async fn test_rejected_items_are_returned() {
        let service = RecordingService {
            reject_id: Some("TX-2".to_string()),
            ..Default::default()
        };
        let config = IndexConfig::new("localhost");
        let submitter = BulkSubmitter::new(&service, &config, 3);

        let result = submitter.submit(&batch(&["TX-1", "TX-2", "TX-3"])).await.unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.errors[0].doc_id.as_deref(), Some("TX-2"));
        assert_eq!(result.errors[0].position, 1);
    }
}
