//! EngineHandle: owner of one analyser instance.
//!
//! Holds the published curves, the detection state, the freeze state and the
//! console client. The analysis thread only ever sees the `CurveStore`, the
//! telemetry hub and its queues; every UI operation takes `&mut self`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::analysis::{
    spawn_analysis_thread, AnalysisPipeline, AnalysisShared, CurveStore, ResponseCurve,
};
use crate::audio::{BlockPool, SampleAccumulator, WavReplay, BLOCK_SIZE};
use crate::config::AppConfig;
use crate::console::{ConsoleClient, OscTransport, RecordingTransport, SendReport};
use crate::eq::{
    ApplyOutcome, Detection, DetectionState, EqBand, EqController, FreezeController,
};
use crate::error::{log_audio_error, log_console_error, AudioError, ConsoleError};
use crate::telemetry::TelemetryHub;

use super::display::DisplayFrame;

/// Running analysis thread and its stop flag
struct AnalysisSession {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Orchestrates analysis, detection and console output.
pub struct EngineHandle {
    config: AppConfig,
    store: Arc<CurveStore>,
    telemetry: Arc<TelemetryHub>,
    controller: EqController,
    freeze: FreezeController,
    show_threshold: bool,
    console: ConsoleClient,
    session: Option<AnalysisSession>,
}

impl EngineHandle {
    /// Create an engine sending through `console`
    pub fn new(config: AppConfig, console: ConsoleClient) -> Self {
        let controller = EqController::new(&config.detection, &config.console);
        Self {
            config,
            store: Arc::new(CurveStore::new()),
            telemetry: Arc::new(TelemetryHub::default()),
            controller,
            freeze: FreezeController::new(),
            show_threshold: false,
            console,
            session: None,
        }
    }

    /// Create an engine talking OSC to the configured console
    pub fn connect(config: AppConfig) -> Result<Self, ConsoleError> {
        let transport = OscTransport::bind(config.console.bind_port, &config.console.target)?;
        let console = ConsoleClient::new(Arc::new(transport), config.console.value_encoding);
        Ok(Self::new(config, console))
    }

    /// Create an engine whose console traffic is only recorded
    pub fn with_recording(config: AppConfig) -> (Self, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let console = ConsoleClient::new(transport.clone(), config.console.value_encoding);
        (Self::new(config, console), transport)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<TelemetryHub> {
        &self.telemetry
    }

    pub fn console(&self) -> &ConsoleClient {
        &self.console
    }

    // ========================================================================
    // ANALYSIS
    // ========================================================================

    /// Spawn the analysis thread and return the producer side for the audio source
    pub fn start_analysis(&mut self) -> Result<SampleAccumulator, AudioError> {
        if self.session.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let analysis = &self.config.analysis;
        let channels = BlockPool::new(analysis.blocks_in_flight.max(2), BLOCK_SIZE);
        let (audio_channels, analysis_channels, spare) = channels.split_for_threads();
        let accumulator = SampleAccumulator::new(audio_channels, spare);

        let running = Arc::new(AtomicBool::new(true));
        let shared = AnalysisShared {
            store: Arc::clone(&self.store),
            telemetry: Arc::clone(&self.telemetry),
            running: Arc::clone(&running),
            dropped_blocks: accumulator.dropped_blocks_ref(),
        };
        let handle = spawn_analysis_thread(
            analysis_channels,
            AnalysisPipeline::from_config(analysis),
            shared,
            Duration::from_millis(analysis.poll_interval_ms.max(1)),
        )?;

        self.session = Some(AnalysisSession { running, handle });
        tracing::info!("[Engine] Analysis started");
        Ok(accumulator)
    }

    /// Stop the analysis thread and wait for it to exit
    pub fn stop_analysis(&mut self) -> Result<(), AudioError> {
        let session = self.session.take().ok_or(AudioError::NotRunning)?;
        session.running.store(false, Ordering::SeqCst);
        session
            .handle
            .join()
            .map_err(|_| AudioError::ThreadFailure {
                reason: "analysis thread panicked".to_string(),
            })?;
        tracing::info!("[Engine] Analysis stopped");
        Ok(())
    }

    pub fn is_analysing(&self) -> bool {
        self.session.is_some()
    }

    /// Run two recorded channels through the same handoff and pipeline, synchronously
    ///
    /// Returns how many smoothed curves were published. A trailing partial
    /// block is ignored.
    pub fn process_offline(
        &mut self,
        measurement: &[f32],
        reference: &[f32],
    ) -> Result<u64, AudioError> {
        if self.session.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (audio_channels, mut analysis_channels, spare) =
            BlockPool::new(2, BLOCK_SIZE).split_for_threads();
        let mut accumulator = SampleAccumulator::new(audio_channels, spare);
        let mut pipeline = AnalysisPipeline::from_config(&self.config.analysis);

        let mut published = 0;
        for (a, b) in measurement
            .chunks_exact(BLOCK_SIZE)
            .zip(reference.chunks_exact(BLOCK_SIZE))
        {
            accumulator.push_slices(a, b);

            while let Ok(block) = analysis_channels.ready_consumer.pop() {
                let started = Instant::now();
                let smoothed = pipeline.process_block(&block);
                let generation = match smoothed {
                    Some(curve) => {
                        published += 1;
                        self.store.publish(curve)
                    }
                    None => self.store.generation(),
                };
                if analysis_channels.pool_producer.push(block).is_err() {
                    tracing::warn!("[Engine] Pool queue full during offline replay");
                }
                self.telemetry
                    .record_block(generation, smoothed.is_some(), started.elapsed());
            }
        }

        tracing::info!(
            "[Engine] Offline replay of {} frames published {} curves",
            measurement.len().min(reference.len()),
            published
        );
        Ok(published)
    }

    pub fn process_wav(&mut self, replay: &WavReplay) -> Result<u64, AudioError> {
        self.process_offline(replay.measurement(), replay.reference())
    }

    /// Latest smoothed curve (live, ignores freeze)
    pub fn latest_curve(&self) -> Arc<ResponseCurve> {
        self.store.snapshot()
    }

    /// Redraw counter: increments on every published curve
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    // ========================================================================
    // DETECTION / EQ
    // ========================================================================

    /// Clamped into 0.5..=1.0; returns the stored value
    pub fn set_threshold(&mut self, threshold: f32) -> f32 {
        self.controller.set_threshold(threshold)
    }

    /// Clamped into 1..=5; returns the stored value
    pub fn set_max_clusters(&mut self, max_clusters: usize) -> usize {
        self.controller.set_max_clusters(max_clusters)
    }

    pub fn threshold(&self) -> f32 {
        self.controller.threshold()
    }

    pub fn max_clusters(&self) -> usize {
        self.controller.max_clusters()
    }

    pub fn detection_state(&self) -> &DetectionState {
        self.controller.state()
    }

    /// Detect clusters on the latest smoothed magnitude
    pub fn detect(&mut self) -> Detection {
        let curve = self.store.snapshot();
        let detection = self.controller.detect(&curve);
        self.telemetry
            .record_detection(detection.peaks.len(), detection.clusters.len());
        tracing::info!(
            "[Engine] Detected {} peaks in {} clusters",
            detection.peaks.len(),
            detection.clusters.len()
        );
        detection
    }

    /// Send one band per held cluster to the console
    pub fn apply(&mut self) -> ApplyOutcome {
        let curve = self.store.snapshot();
        let outcome = self.controller.apply(&curve);
        match &outcome {
            ApplyOutcome::NotDetected => {
                tracing::info!("[Engine] Must detect before applying");
            }
            ApplyOutcome::Applied(bands) => {
                let report = self.console.send_bands(bands);
                self.report_failures(&report);
                self.telemetry.record_bands_applied(bands.len());
                tracing::info!(
                    "[Engine] Applied {} bands ({} messages sent)",
                    bands.len(),
                    report.sent
                );
            }
        }
        outcome
    }

    /// Bands `apply` would send right now, without sending them
    pub fn plan_bands(&self) -> Vec<EqBand> {
        match self.controller.apply(&self.store.snapshot()) {
            ApplyOutcome::Applied(bands) => bands,
            ApplyOutcome::NotDetected => Vec::new(),
        }
    }

    /// Forget the clusters and zero every managed console gain
    pub fn reset(&mut self) -> SendReport {
        self.controller.reset();
        let slots = self.config.console.managed_slots;
        let report = self.console.reset_band_gains(slots);
        self.report_failures(&report);
        self.telemetry.record_reset(slots);
        tracing::info!("[Engine] Reset {} EQ slots", slots);
        report
    }

    /// Put the desk into self-test routing
    pub fn prepare_self_test(&mut self) -> SendReport {
        let report = self
            .console
            .prepare_self_test(self.config.console.managed_slots);
        self.report_failures(&report);
        report
    }

    /// Main stereo fader level (0.0-1.0)
    pub fn set_main_fader(&mut self, level: f32) -> Result<(), ConsoleError> {
        let result = self.console.set_main_fader(level);
        if let Err(err) = &result {
            self.report_failure(err);
        }
        result
    }

    /// Send all further console traffic to `address` (`ip:port`)
    ///
    /// On success the configured target follows; on failure the previous
    /// console keeps receiving.
    pub fn retarget_console(&mut self, address: &str) -> Result<SocketAddr, ConsoleError> {
        match self.console.retarget(address) {
            Ok(resolved) => {
                self.config.console.target = resolved.to_string();
                Ok(resolved)
            }
            Err(err) => {
                log_console_error(&err, "retarget_console");
                Err(err)
            }
        }
    }

    fn report_failures(&self, report: &SendReport) {
        for err in &report.failures {
            self.report_failure(err);
        }
    }

    fn report_failure(&self, err: &ConsoleError) {
        log_console_error(err, "console send");
        self.telemetry
            .record_send_failure(err.path().unwrap_or("-"), err.to_string());
    }

    // ========================================================================
    // DISPLAY
    // ========================================================================

    pub fn set_freeze(&mut self, engaged: bool) {
        let live = self.store.snapshot();
        self.freeze.set(engaged, &live);
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.is_engaged()
    }

    pub fn set_show_threshold(&mut self, show: bool) {
        self.show_threshold = show;
    }

    /// Curves and overlays for the next redraw
    pub fn display(&self) -> DisplayFrame {
        let generation = self.store.generation();
        let live = self.store.snapshot();
        let curve = self.freeze.display_curve(&live);
        let threshold = self.show_threshold.then(|| self.controller.threshold());
        DisplayFrame::build(
            generation,
            self.freeze.is_engaged(),
            &curve,
            threshold,
            self.controller.clusters(),
        )
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(err) = self.stop_analysis() {
                log_audio_error(&err, "EngineHandle::drop");
            }
        }
    }
}
