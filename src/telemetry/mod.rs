//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes block throughput, detection results and console
//! failures into a bounded history plus a broadcast stream. One hub is owned
//! by each `EngineHandle` and shared with its analysis thread through an `Arc`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;

pub mod events;

pub use events::MetricEvent;

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        let history_capacity = history_capacity.max(1);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = lock_recovering(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = lock_recovering(&self.history);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window of per-block processing times (milliseconds).
struct ProcessingTimeTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl ProcessingTimeTracker {
    fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, max, count)
    }
}

/// Collector plus derived gauges, owned by one engine.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    processing: Mutex<ProcessingTimeTracker>,
    report_every: u64,
    blocks_seen: AtomicU64,
    last_dropped: AtomicU64,
}

impl TelemetryHub {
    /// `report_every` controls how often a `ProcessingTime` summary is emitted (in blocks)
    pub fn new(
        channel_capacity: usize,
        history_capacity: usize,
        window: usize,
        report_every: u64,
    ) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            processing: Mutex::new(ProcessingTimeTracker::new(window)),
            report_every: report_every.max(1),
            blocks_seen: AtomicU64::new(0),
            last_dropped: AtomicU64::new(0),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.collector.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.collector.subscribe()
    }

    pub fn record_block(&self, generation: u64, smoothed: bool, elapsed: Duration) {
        self.collector.publish(MetricEvent::BlockProcessed {
            generation,
            smoothed,
            processing_us: elapsed.as_micros() as u64,
        });

        let (avg, max, count) =
            lock_recovering(&self.processing).observe(elapsed.as_secs_f32() * 1000.0);

        let seen = self.blocks_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % self.report_every == 0 {
            self.collector.publish(MetricEvent::ProcessingTime {
                avg_ms: avg,
                max_ms: max,
                sample_count: count,
            });
        }
    }

    /// Publish only when the producer's drop counter moved since the last call
    pub fn record_dropped_total(&self, total: u64) {
        let previous = self.last_dropped.swap(total, Ordering::Relaxed);
        if total > previous {
            self.collector.publish(MetricEvent::BlockDropped { total });
        }
    }

    pub fn record_detection(&self, peak_count: usize, cluster_count: usize) {
        self.collector.publish(MetricEvent::ClustersDetected {
            peak_count,
            cluster_count,
        });
    }

    pub fn record_bands_applied(&self, band_count: usize) {
        self.collector
            .publish(MetricEvent::BandsApplied { band_count });
    }

    pub fn record_reset(&self, slots: usize) {
        self.collector.publish(MetricEvent::BandsReset { slots });
    }

    pub fn record_send_failure(&self, path: impl Into<String>, reason: impl Into<String>) {
        self.collector.publish(MetricEvent::ConsoleSendFailed {
            path: path.into(),
            reason: reason.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 32, 20)
    }
}
