use std::sync::Mutex;

use crate::{error::SinkError, types::MetricPoint};

/// Append-only time-series write interface.
///
/// Implementations must tolerate concurrent `insert` calls from several
/// samplers; retention is the implementation's own concern.
pub trait TelemetrySink: Send + Sync {
    fn insert(&self, rows: &[MetricPoint]) -> Result<(), SinkError>;
}

/// Keeps every point in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<MetricPoint>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far, in write order.
    pub fn points(&self) -> Vec<MetricPoint> {
        self.rows.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetrySink for MemorySink {
    fn insert(&self, rows: &[MetricPoint]) -> Result<(), SinkError> {
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }
}
