use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline outcomes.
#[derive(Default)]
pub struct PipelineMetrics {
    completed: AtomicU64,
    extraction_failed: AtomicU64,
    inference_failed: AtomicU64,
    rejected_uploads: AtomicU64,
    truncated: AtomicU64,
    retries: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request that reached `Completed`.
    pub fn record_completed(&self, truncated: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if truncated {
            self.truncated.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an upload rejected before extraction (empty, oversized, or bad options).
    pub fn record_rejected(&self) {
        self.rejected_uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that ended in `ExtractionFailed`.
    pub fn record_extraction_failed(&self) {
        self.extraction_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request that ended in `InferenceFailed`.
    pub fn record_inference_failed(&self) {
        self.inference_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one retried inference attempt.
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            extraction_failed: self.extraction_failed.load(Ordering::Relaxed),
            inference_failed: self.inference_failed.load(Ordering::Relaxed),
            rejected_uploads: self.rejected_uploads.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Requests that returned generated text.
    pub completed: u64,
    /// Requests that stopped at extraction.
    pub extraction_failed: u64,
    /// Requests that stopped at inference.
    pub inference_failed: u64,
    /// Uploads rejected before extraction.
    pub rejected_uploads: u64,
    /// Completed requests whose input was truncated.
    pub truncated: u64,
    /// Inference retries issued across all requests.
    pub retries: u64,
}
