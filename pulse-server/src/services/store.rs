//! Persistence of authorized documents.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::utils::DateFeatures;

/// The endpoint a record was received on.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Metrics,
    User,
    Message,
}

/// An authorized document with receive metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub kind: RecordKind,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateFeatures>,
}

impl Record {
    /// Creates a record received now.
    pub fn new(kind: RecordKind, payload: Value) -> Self {
        Self {
            kind,
            received_at: Utc::now(),
            payload,
            date: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is full ({capacity} records)")]
    Full { capacity: usize },
}

/// Accepts records from the inbound endpoints.
pub trait Store: fmt::Debug + Send + Sync {
    /// Persists a single record.
    fn persist(&self, record: Record) -> Result<(), StoreError>;
}

/// A bounded store that keeps records in memory.
#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    records: Mutex<Vec<Record>>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all stored records in insertion order.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn persist(&self, record: Record) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            return Err(StoreError::Full {
                capacity: self.capacity,
            });
        }

        pulse_log::trace!("storing {:?} record", record.kind);
        records.push(record);
        Ok(())
    }
}
