// Self-test signal - a reference/measurement pair with a known deviation
//
// The reference is seeded white noise; the measurement is the same noise run
// through one or more peaking-EQ boosts (RBJ cookbook biquads). Feeding the
// pair through the analyser should surface clusters around each boost, which
// makes this the desk-free way to exercise detect/apply end to end.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::SAMPLE_RATE;

/// Peak amplitude of the uniform noise; lands the spectrum mid-way in the -60..-40 dB window
pub const DEFAULT_NOISE_AMPLITUDE: f32 = 0.35;

/// One resonance imposed on the measurement channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resonance {
    pub frequency_hz: f32,
    pub q: f32,
    pub gain_db: f32,
}

/// Second-order peaking filter, direct form I
#[derive(Debug, Clone)]
struct PeakingBiquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl PeakingBiquad {
    fn new(resonance: Resonance, sample_rate: f32) -> Self {
        let omega = 2.0 * std::f32::consts::PI * resonance.frequency_hz / sample_rate;
        let (sn, cs) = omega.sin_cos();
        let alpha = sn / (2.0 * resonance.q);
        let a = 10.0_f32.powf(resonance.gain_db / 40.0);

        let a0 = 1.0 + alpha / a;
        let norm = 1.0 / a0;

        Self {
            b0: (1.0 + alpha * a) * norm,
            b1: (-2.0 * cs) * norm,
            b2: (1.0 - alpha * a) * norm,
            a1: (-2.0 * cs) * norm,
            a2: (1.0 - alpha / a) * norm,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

/// Deterministic generator of self-test sample pairs
pub struct SelfTestSignal {
    rng: StdRng,
    amplitude: f32,
    filters: Vec<PeakingBiquad>,
}

impl SelfTestSignal {
    pub fn new(seed: u64, resonances: &[Resonance]) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            amplitude: DEFAULT_NOISE_AMPLITUDE,
            filters: resonances
                .iter()
                .map(|r| PeakingBiquad::new(*r, SAMPLE_RATE as f32))
                .collect(),
        }
    }

    /// Peak noise amplitude; the sign is ignored and non-finite values keep the default
    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        if amplitude.is_finite() {
            self.amplitude = amplitude.abs();
        }
        self
    }

    /// Next (measurement, reference) pair
    pub fn next_pair(&mut self) -> (f32, f32) {
        let reference = self.rng.gen_range(-self.amplitude..=self.amplitude);
        let measurement = self
            .filters
            .iter_mut()
            .fold(reference, |acc, filter| filter.process(acc));
        (measurement, reference)
    }

    /// Render `frames` pairs into two channel vectors
    pub fn render(&mut self, frames: usize) -> (Vec<f32>, Vec<f32>) {
        let mut measurement = Vec::with_capacity(frames);
        let mut reference = Vec::with_capacity(frames);
        for _ in 0..frames {
            let (m, r) = self.next_pair();
            measurement.push(m);
            reference.push(r);
        }
        (measurement, reference)
    }
}

impl Iterator for SelfTestSignal {
    type Item = (f32, f32);

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_pair())
    }
}
