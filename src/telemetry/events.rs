//! Telemetry event types reported by the analysis thread and the engine.

use serde::{Deserialize, Serialize};

/// Metric events covering block throughput, detection and console traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// A block went through the transform; `smoothed` when it produced a published curve
    BlockProcessed {
        generation: u64,
        smoothed: bool,
        processing_us: u64,
    },
    /// Processing time over the recent window of blocks
    ProcessingTime {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    /// The producer overwrote blocks the consumer had not picked up yet
    BlockDropped { total: u64 },
    ClustersDetected {
        peak_count: usize,
        cluster_count: usize,
    },
    BandsApplied { band_count: usize },
    BandsReset { slots: usize },
    ConsoleSendFailed { path: String, reason: String },
}
