// Frequency mapping between display buckets and FFT bins
//
// The display uses BUCKET_COUNT log-spaced buckets from 20 Hz towards 20 kHz
// (bucket i sits at proportion i / BUCKET_COUNT, so the last bucket falls
// just short of 20 kHz). Each bucket reads exactly one FFT bin: the bin
// nearest its frequency on the linear bin grid. Below ~200 Hz several
// neighbouring buckets share a bin; that aliasing is part of the output.

use super::BUCKET_COUNT;

/// Lowest display frequency in Hz
pub const MIN_FREQUENCY: f32 = 20.0;

/// Upper end of the display scale in Hz
pub const MAX_FREQUENCY: f32 = 20_000.0;

/// Frequency in Hz of display bucket `bucket`
pub fn bucket_to_frequency(bucket: usize) -> f32 {
    let log_min = (MIN_FREQUENCY as f64).log10();
    let log_max = (MAX_FREQUENCY as f64).log10();
    let proportion = bucket as f64 / BUCKET_COUNT as f64;
    10f64.powf(log_min + proportion * (log_max - log_min)) as f32
}

/// Linear FFT bin nearest to `frequency`, clamped to [0, fft_size / 2]
pub fn frequency_to_bin(frequency: f32, sample_rate: u32, fft_size: usize) -> usize {
    let half = fft_size / 2;
    let nyquist = sample_rate as f64 / 2.0;
    let bin = (frequency as f64 / nyquist * half as f64).round();
    if bin <= 0.0 {
        0
    } else {
        (bin as usize).min(half)
    }
}

/// Precomputed bucket -> bin table for one sample rate and FFT size
#[derive(Debug, Clone)]
pub struct FrequencyMapper {
    bins: [usize; BUCKET_COUNT],
}

impl FrequencyMapper {
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        let mut bins = [0; BUCKET_COUNT];
        for (bucket, bin) in bins.iter_mut().enumerate() {
            *bin = frequency_to_bin(bucket_to_frequency(bucket), sample_rate, fft_size);
        }
        Self { bins }
    }

    /// FFT bin read by `bucket`
    pub fn bin(&self, bucket: usize) -> usize {
        self.bins[bucket]
    }

    pub fn bins(&self) -> &[usize; BUCKET_COUNT] {
        &self.bins
    }
}
