//! Batch assembly

use crate::record::EnrichedRecord;

/// A group of records submitted in one bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    index: u64,
    file_name: String,
    batch_size: usize,
    batch_scale: u32,
    records: Vec<EnrichedRecord>,
}

impl Batch {
    /// 0-based position of this batch within the file
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Configured batch size; the final batch may hold fewer records
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batch_scale(&self) -> u32 {
        self.batch_scale
    }

    /// Bookkeeping slot of this batch, `index % batch_scale`.
    pub fn scale_slot(&self) -> u64 {
        self.index % u64::from(self.batch_scale.max(1))
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<EnrichedRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Groups records into batches of `batch_size`.
///
/// Never yields an empty batch, so N records produce `ceil(N / batch_size)`
/// batches.
#[derive(Debug)]
pub struct BatchAssembler {
    file_name: String,
    batch_size: usize,
    batch_scale: u32,
    next_index: u64,
    pending: Vec<EnrichedRecord>,
}

impl BatchAssembler {
    pub fn new(file_name: impl Into<String>, batch_size: usize, batch_scale: u32) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            file_name: file_name.into(),
            batch_size,
            batch_scale,
            next_index: 0,
            pending: Vec::with_capacity(batch_size),
        }
    }

    /// Index of the batch currently being filled.
    pub fn current_index(&self) -> u64 {
        self.next_index
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Add a record; returns the completed batch once it is full.
    pub fn push(&mut self, record: EnrichedRecord) -> Option<Batch> {
        self.pending.push(record);

        if self.pending.len() >= self.batch_size {
            Some(self.take_batch())
        } else {
            None
        }
    }

    /// Flush the remaining records as a final, possibly short, batch.
    pub fn finish(&mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_batch())
        }
    }

    fn take_batch(&mut self) -> Batch {
        let records = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let batch = Batch {
            index: self.next_index,
            file_name: self.file_name.clone(),
            batch_size: self.batch_size,
            batch_scale: self.batch_scale,
            records,
        };
        self.next_index += 1;
        batch
    }
}
