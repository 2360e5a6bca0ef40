//! Batch processing and export of trace records.

use crate::record::ExportItem;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors from trace exporters.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExportError {
    /// The sink rejected or failed to receive the batch.
    #[error("export failed: {0}")]
    Failed(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A sink for completed trace records.
///
/// Implementations:
/// - [`ConsoleExporter`]: JSON lines to stdout (development)
/// - [`MemoryExporter`]: in-process buffer (tests)
/// - an OTLP/vendor bridge (out of tree)
#[async_trait]
pub trait TraceExporter: Send + Sync {
    /// Deliver a batch of records to the sink.
    async fn export(&self, items: &[ExportItem]) -> Result<(), ExportError>;
}

/// Default cap on buffered records before the oldest are discarded.
const DEFAULT_MAX_QUEUE: usize = 4096;

/// Buffers completed records and flushes them to configured exporters.
///
/// `enqueue` is synchronous so span handles can record from any exit
/// path (including `Drop`). Delivery happens on [`BatchProcessor::flush`],
/// which the runner calls at the end of every run. Export failures are
/// logged, never propagated — observability must not fail a run.
pub struct BatchProcessor {
    queue: Mutex<Vec<ExportItem>>,
    exporters: Vec<Arc<dyn TraceExporter>>,
    max_queue: usize,
}

impl BatchProcessor {
    /// Create a processor flushing to the given exporters.
    pub fn new(exporters: Vec<Arc<dyn TraceExporter>>) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            exporters,
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }

    /// Override the buffered-record cap.
    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue.max(1);
        self
    }

    /// Buffer one record. If the buffer is at capacity the oldest record
    /// is discarded with a warning.
    pub fn enqueue(&self, item: ExportItem) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= self.max_queue {
            queue.remove(0);
            tracing::warn!(
                max_queue = self.max_queue,
                "trace buffer full, dropping oldest record"
            );
        }
        queue.push(item);
    }

    /// Number of records currently buffered.
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Drain the buffer and deliver it to every exporter.
    pub async fn flush(&self) {
        let batch: Vec<ExportItem> = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *queue)
        };
        if batch.is_empty() {
            return;
        }
        for exporter in &self.exporters {
            if let Err(e) = exporter.export(&batch).await {
                tracing::warn!(error = %e, "trace exporter failed");
            }
        }
    }

    /// Flush remaining records. Call before process exit.
    pub async fn shutdown(&self) {
        self.flush().await;
    }
}

/// Exporter that writes each record as a JSON line to stdout.
#[derive(Debug, Default)]
pub struct ConsoleExporter;

impl ConsoleExporter {
    /// Create a console exporter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TraceExporter for ConsoleExporter {
    async fn export(&self, items: &[ExportItem]) -> Result<(), ExportError> {
        for item in items {
            let line = serde_json::to_string(item)
                .map_err(|e| ExportError::Failed(e.to_string()))?;
            println!("{line}");
        }
        Ok(())
    }
}

/// Exporter that retains every record in memory. Test support.
#[derive(Default)]
pub struct MemoryExporter {
    items: Mutex<Vec<ExportItem>>,
}

impl MemoryExporter {
    /// Create an empty memory exporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything exported so far, in delivery order.
    pub fn items(&self) -> Vec<ExportItem> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl TraceExporter for MemoryExporter {
    async fn export(&self, items: &[ExportItem]) -> Result<(), ExportError> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(items);
        Ok(())
    }
}
