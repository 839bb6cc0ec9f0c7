// Analysis module - spectral pipeline from stereo blocks to smoothed response curves
//
// This module orchestrates the continuous half of the analyser: every block
// handed over by the audio callback is transformed, mapped onto the display
// buckets, turned into a relative response and averaged over time.
//
// Architecture:
// - AnalysisThread: polls the READY queue, runs the pipeline, returns blocks to POOL
// - Pipeline: SpectralTransform → FrequencyMapper → RelativeResponseComputer → TemporalAverager
// - Output: smoothed ResponseCurve published to a CurveStore (snapshot-and-swap)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtrb::PopError;

use crate::audio::buffer_pool::{AnalysisThreadChannels, StereoBlock, BLOCK_SIZE};
use crate::config::AnalysisConfig;
use crate::error::AudioError;
use crate::telemetry::TelemetryHub;

pub mod averager;
pub mod mapping;
pub mod response;
pub mod spectrum;

use averager::TemporalAverager;
use mapping::FrequencyMapper;
use response::RelativeResponseComputer;
use spectrum::SpectralTransform;

/// Fixed analysis sample rate in Hz
pub const SAMPLE_RATE: u32 = 48_000;

/// Transform length; one FFT per block
pub const FFT_SIZE: usize = BLOCK_SIZE;

/// Number of log-spaced display buckets
pub const BUCKET_COUNT: usize = 201;

/// Relative magnitude and phase for every display bucket
///
/// Magnitude lies in [0, 1] with 0.5 meaning both channels are at the same
/// level; phase is in radians in (-pi, pi].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseCurve {
    pub magnitude: [f32; BUCKET_COUNT],
    pub phase: [f32; BUCKET_COUNT],
}

impl ResponseCurve {
    pub fn zeroed() -> Self {
        Self::constant(0.0, 0.0)
    }

    pub fn constant(magnitude: f32, phase: f32) -> Self {
        Self {
            magnitude: [magnitude; BUCKET_COUNT],
            phase: [phase; BUCKET_COUNT],
        }
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Transform, mapping, response and averaging stages for one stream of blocks
pub struct AnalysisPipeline {
    transform: SpectralTransform,
    mapper: FrequencyMapper,
    response: RelativeResponseComputer,
    averager: TemporalAverager,
}

impl AnalysisPipeline {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            transform: SpectralTransform::new(FFT_SIZE),
            mapper: FrequencyMapper::new(SAMPLE_RATE, FFT_SIZE),
            response: RelativeResponseComputer::new(FFT_SIZE, config.min_db, config.max_db),
            averager: TemporalAverager::new(config.average_frames, config.retirement),
        }
    }

    /// Raw (unsmoothed) response of a single block
    pub fn raw_response(&mut self, block: &StereoBlock) -> ResponseCurve {
        let spectra = self.transform.process(block);
        self.response.compute(&spectra, &self.mapper)
    }

    /// Run one block through every stage; `Some` when the averager emits
    pub fn process_block(&mut self, block: &StereoBlock) -> Option<ResponseCurve> {
        let raw = self.raw_response(block);
        self.averager.push(&raw)
    }

    /// Forget the averaging history
    pub fn reset(&mut self) {
        self.averager.clear();
    }

    pub fn mapper(&self) -> &FrequencyMapper {
        &self.mapper
    }
}

/// Latest smoothed curve, published by the analysis thread
///
/// Readers take an `Arc` snapshot; the write lock is only held for the
/// pointer swap. The generation counter increments on every publish and
/// doubles as the redraw signal.
pub struct CurveStore {
    latest: RwLock<Arc<ResponseCurve>>,
    generation: AtomicU64,
}

impl CurveStore {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(Arc::new(ResponseCurve::zeroed())),
            generation: AtomicU64::new(0),
        }
    }

    /// Swap in a new curve and return its generation
    pub fn publish(&self, curve: ResponseCurve) -> u64 {
        let next = Arc::new(curve);
        {
            let mut latest = self
                .latest
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *latest = next;
        }
        self.generation.fetch_add(1, Ordering::Release) + 1
    }

    pub fn snapshot(&self) -> Arc<ResponseCurve> {
        let latest = self
            .latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&latest)
    }

    /// Number of curves published so far (0 before the first)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for CurveStore {
    fn default() -> Self {
        Self::new()
    }
}

/// State the analysis thread shares with its owner
#[derive(Clone)]
pub struct AnalysisShared {
    pub store: Arc<CurveStore>,
    pub telemetry: Arc<TelemetryHub>,
    /// Cleared by the owner to stop the thread
    pub running: Arc<AtomicBool>,
    /// Producer-side drop counter (see `SampleAccumulator::dropped_blocks_ref`)
    pub dropped_blocks: Arc<AtomicU64>,
}

struct AnalysisWorker {
    analysis_channels: AnalysisThreadChannels,
    pipeline: AnalysisPipeline,
    shared: AnalysisShared,
    poll_interval: Duration,
    processed_blocks: u64,
}

impl AnalysisWorker {
    fn new(
        analysis_channels: AnalysisThreadChannels,
        pipeline: AnalysisPipeline,
        shared: AnalysisShared,
        poll_interval: Duration,
    ) -> Self {
        Self {
            analysis_channels,
            pipeline,
            shared,
            poll_interval,
            processed_blocks: 0,
        }
    }

    /// Process every block currently waiting; returns how many were handled
    fn drain(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let block = match self.analysis_channels.ready_consumer.pop() {
                Ok(block) => block,
                Err(PopError::Empty) => break,
            };

            let started = Instant::now();
            let smoothed = self.pipeline.process_block(&block);
            let generation = match smoothed {
                Some(curve) => self.shared.store.publish(curve),
                None => self.shared.store.generation(),
            };

            // Return block to pool so the producer can fill it again
            if self.analysis_channels.pool_producer.push(block).is_err() {
                tracing::warn!("[AnalysisThread] Pool queue full, dropping block");
            }

            self.shared
                .telemetry
                .record_block(generation, smoothed.is_some(), started.elapsed());

            self.processed_blocks += 1;
            handled += 1;
        }
        handled
    }

    fn run(mut self) {
        tracing::info!(
            "[AnalysisThread] Starting analysis loop (poll every {:?})",
            self.poll_interval
        );

        loop {
            let handled = self.drain();
            if handled > 1 {
                tracing::debug!("[AnalysisThread] Caught up on {} blocks", handled);
            }

            self.shared
                .telemetry
                .record_dropped_total(self.shared.dropped_blocks.load(Ordering::Relaxed));

            if !self.shared.running.load(Ordering::SeqCst) {
                tracing::info!(
                    "[AnalysisThread] Stop requested after {} blocks, exiting",
                    self.processed_blocks
                );
                break;
            }

            thread::sleep(self.poll_interval);
        }
    }
}

/// Spawn the consumer thread for `analysis_channels`
///
/// The thread runs until `shared.running` is cleared, then drains what is
/// left in the ready queue and exits.
pub fn spawn_analysis_thread(
    analysis_channels: AnalysisThreadChannels,
    pipeline: AnalysisPipeline,
    shared: AnalysisShared,
    poll_interval: Duration,
) -> Result<JoinHandle<()>, AudioError> {
    thread::Builder::new()
        .name("rta-analysis".to_string())
        .spawn(move || {
            let worker = AnalysisWorker::new(analysis_channels, pipeline, shared, poll_interval);
            worker.run();
        })
        .map_err(|e| AudioError::ThreadFailure {
            reason: format!("Failed to spawn analysis thread: {}", e),
        })
}
