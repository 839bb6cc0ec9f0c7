// Temporal averager - sliding mean of raw response curves
//
// Holds the last `frames` raw curves for magnitude and phase. Once the window
// is full every push yields the per-bucket arithmetic mean of both signals,
// then the window retires curves according to its `Retirement` policy.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{ResponseCurve, BUCKET_COUNT};

/// What happens to the window after it emits a smoothed curve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retirement {
    /// Drop the oldest curve; every following block emits again
    #[default]
    Rolling,
    /// Drop every curve; the next emission needs a full new window
    Flush,
}

/// Averages the last `frames` response curves
#[derive(Debug)]
pub struct TemporalAverager {
    frames: usize,
    retirement: Retirement,
    magnitude: VecDeque<[f32; BUCKET_COUNT]>,
    phase: VecDeque<[f32; BUCKET_COUNT]>,
}

impl TemporalAverager {
    /// `frames` is clamped to at least 1
    pub fn new(frames: usize, retirement: Retirement) -> Self {
        let frames = frames.max(1);
        Self {
            frames,
            retirement,
            magnitude: VecDeque::with_capacity(frames),
            phase: VecDeque::with_capacity(frames),
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn retirement(&self) -> Retirement {
        self.retirement
    }

    /// Curves currently held
    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }

    /// Add one raw curve; returns the smoothed curve when the window is full
    pub fn push(&mut self, curve: &ResponseCurve) -> Option<ResponseCurve> {
        self.magnitude.push_back(curve.magnitude);
        self.phase.push_back(curve.phase);

        if self.magnitude.len() < self.frames {
            return None;
        }

        let smoothed = ResponseCurve {
            magnitude: Self::mean(&self.magnitude),
            phase: Self::mean(&self.phase),
        };

        match self.retirement {
            Retirement::Rolling => {
                self.magnitude.pop_front();
                self.phase.pop_front();
            }
            Retirement::Flush => {
                self.magnitude.clear();
                self.phase.clear();
            }
        }

        Some(smoothed)
    }

    /// Forget every held curve
    pub fn clear(&mut self) {
        self.magnitude.clear();
        self.phase.clear();
    }

    fn mean(window: &VecDeque<[f32; BUCKET_COUNT]>) -> [f32; BUCKET_COUNT] {
        let mut sum = [0.0f64; BUCKET_COUNT];
        for curve in window {
            for (acc, &value) in sum.iter_mut().zip(curve.iter()) {
                *acc += value as f64;
            }
        }

        let count = window.len().max(1) as f64;
        let mut out = [0.0f32; BUCKET_COUNT];
        for (slot, total) in out.iter_mut().zip(sum.iter()) {
            *slot = (total / count) as f32;
        }
        out
    }
}
