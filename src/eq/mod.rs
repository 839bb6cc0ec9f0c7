//! Detection state machine and EQ band planning.
//!
//! `EqController` owns the detect/apply/reset cycle:
//! - `detect` snapshots the smoothed magnitude and replaces the cluster set
//! - `apply` turns the held clusters into bands using the latest magnitude
//! - `reset` forgets the clusters
//!
//! It plans, it does not send; the engine forwards planned bands to the console.

pub mod bands;
pub mod clusters;
pub mod freeze;

pub use bands::{BandPolicy, EqBand, GainRule, QRule};
pub use clusters::{Cluster, Detection, PeakClusterEngine};
pub use freeze::FreezeController;

use crate::analysis::ResponseCurve;
use crate::config::{ConsoleConfig, DetectionConfig};

/// Whether clusters are currently held
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetectionState {
    #[default]
    Idle,
    Detected(Vec<Cluster>),
}

/// Result of an apply request
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Bands to send, one per held cluster (possibly none)
    Applied(Vec<EqBand>),
    /// Apply was requested before any detect
    NotDetected,
}

pub struct EqController {
    engine: PeakClusterEngine,
    policy: BandPolicy,
    state: DetectionState,
    first_slot: usize,
}

impl EqController {
    pub fn new(detection: &DetectionConfig, console: &ConsoleConfig) -> Self {
        Self::with_policy(detection, console, BandPolicy::default())
    }

    pub fn with_policy(
        detection: &DetectionConfig,
        console: &ConsoleConfig,
        policy: BandPolicy,
    ) -> Self {
        Self {
            engine: PeakClusterEngine::new(
                detection.threshold,
                detection.max_clusters,
                detection.min_distance,
            ),
            policy,
            state: DetectionState::Idle,
            first_slot: console.first_band_slot,
        }
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn is_detected(&self) -> bool {
        matches!(self.state, DetectionState::Detected(_))
    }

    /// Held clusters (empty while idle)
    pub fn clusters(&self) -> &[Cluster] {
        match &self.state {
            DetectionState::Detected(clusters) => clusters,
            DetectionState::Idle => &[],
        }
    }

    pub fn threshold(&self) -> f32 {
        self.engine.threshold()
    }

    pub fn max_clusters(&self) -> usize {
        self.engine.max_clusters()
    }

    pub fn set_threshold(&mut self, threshold: f32) -> f32 {
        self.engine.set_threshold(threshold)
    }

    pub fn set_max_clusters(&mut self, max_clusters: usize) -> usize {
        self.engine.set_max_clusters(max_clusters)
    }

    /// Replace the held clusters with a fresh detection on `curve`
    pub fn detect(&mut self, curve: &ResponseCurve) -> Detection {
        let detection = self.engine.detect(&curve.magnitude);
        self.state = DetectionState::Detected(detection.clusters.clone());
        detection
    }

    /// Plan one band per held cluster, reading gains from `curve`
    pub fn apply(&self, curve: &ResponseCurve) -> ApplyOutcome {
        match &self.state {
            DetectionState::Idle => ApplyOutcome::NotDetected,
            DetectionState::Detected(clusters) => ApplyOutcome::Applied(self.policy.derive(
                clusters,
                &curve.magnitude,
                self.first_slot,
            )),
        }
    }

    pub fn reset(&mut self) {
        self.state = DetectionState::Idle;
    }
}
