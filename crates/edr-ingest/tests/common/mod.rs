//! Shared fixtures for integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use edr_ingest::index::{BulkOutcome, IndexAction, IndexingService, ItemIndexError};
use edr_ingest::{IngestError, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

pub const HEADER: &str = "PROCESS_ID,COMPONENT_ID,TRANSACTION_ID,SESSION_ID,EVENT_TIMESTAMP,EVENT_TYPE,DIVISION_ID,GROUP_ID,SUBSCRIBER_ID,SUBSCRIBER_TYPE,DEVICE_ID,PLAN_ID,NOTIFICATION_TYPE,NOTIFICATION_ADDRESS,USAGE,CHARGE_AMOUNT,";

/// A valid data line with transaction id `TX-<n>`.
pub fn data_line(n: usize) -> String {
    format!(
        "P1,C1,TX-{n},S-{n},2017/01/01 00:00:01.123456,DATA,DIV7,G2,SUB{n},PREPAID,DEV{n},PLAN5,SMS,555-0100,2048,1.25,"
    )
}

/// Header followed by `count` valid data lines.
pub fn edr_text(count: usize) -> String {
    let mut text = format!("{}\n", HEADER);
    for n in 0..count {
        text.push_str(&data_line(n));
        text.push('\n');
    }
    text
}

/// Write `contents` to `edr.csv` inside a fresh temp dir.
pub fn write_input(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("edr.csv");
    fs::write(&path, contents).expect("Failed to write EDR fixture");
    (dir, path)
}

/// In-memory indexing service that records every call.
#[derive(Default)]
pub struct MockIndexingService {
    pub existing: Mutex<Vec<String>>,
    pub created: Mutex<Vec<(String, serde_json::Value)>>,
    pub bulk_calls: Mutex<Vec<(Vec<IndexAction>, usize)>>,
    pub reject_ids: Vec<String>,
    pub fail_bulk: bool,
}

impl MockIndexingService {
    pub fn with_existing_index(name: &str) -> Self {
        let service = Self::default();
        service.existing.lock().unwrap().push(name.to_string());
        service
    }

    pub fn bulk_call_count(&self) -> usize {
        self.bulk_calls.lock().unwrap().len()
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.bulk_calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(actions, _)| actions.iter().map(|a| a.id.clone()))
            .collect()
    }
}

#[async_trait]
impl IndexingService for MockIndexingService {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.existing.lock().unwrap().iter().any(|name| name == index))
    }

    async fn create_index(&self, index: &str, body: &serde_json::Value) -> Result<()> {
        self.created.lock().unwrap().push((index.to_string(), body.clone()));
        self.existing.lock().unwrap().push(index.to_string());
        Ok(())
    }

    async fn bulk(&self, actions: &[IndexAction], chunk_size: usize) -> Result<BulkOutcome> {
        if self.fail_bulk {
            return Err(IngestError::transport("503 Service Unavailable"));
        }

        self.bulk_calls.lock().unwrap().push((actions.to_vec(), chunk_size));

        let mut outcome = BulkOutcome::default();
        for (position, action) in actions.iter().enumerate() {
            if self.reject_ids.contains(&action.id) {
                outcome.errors.push(ItemIndexError {
                    position,
                    doc_id: Some(action.id.clone()),
                    status: 400,
                    error_type: "mapper_parsing_exception".to_string(),
                    reason: "failed to parse".to_string(),
                });
            } else {
                outcome.success_count += 1;
            }
        }
        Ok(outcome)
    }
}
