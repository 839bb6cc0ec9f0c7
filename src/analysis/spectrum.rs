// Spectral transform - windowed forward FFT of both channels
//
// Each channel's real block is lifted to complex (zero imaginary part),
// multiplied by a Hann window and transformed in place. The plan, window and
// scratch space are created once; `process` does no allocation.
//
// No 1/N scaling happens here: the response stage subtracts 20*log10(N).

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::audio::StereoBlock;

/// Hann window of `size` points
///
/// Uses the symmetric form `0.5 * (1 - cos(2*pi*i / (size - 1)))`. With
/// `normalise` the table is scaled so its sum equals `size`, which keeps a
/// full-scale sinusoid at the same level it would have unwindowed.
pub fn hann_window(size: usize, normalise: bool) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }

    let mut window: Vec<f32> = (0..size)
        .map(|i| {
            0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (size as f32 - 1.0)).cos())
        })
        .collect();

    if normalise {
        let sum: f64 = window.iter().map(|&w| w as f64).sum();
        if sum > 0.0 {
            let factor = (size as f64 / sum) as f32;
            window.iter_mut().for_each(|w| *w *= factor);
        }
    }

    window
}

/// Borrowed view of the two spectra produced from one block
#[derive(Debug, Clone, Copy)]
pub struct SpectrumPair<'a> {
    pub measurement: &'a [Complex<f32>],
    pub reference: &'a [Complex<f32>],
}

/// Forward FFT processor for measurement/reference blocks
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    measurement: Vec<Complex<f32>>,
    reference: Vec<Complex<f32>>,
}

impl SpectralTransform {
    /// Plan a transform of `fft_size` points (a power of two)
    pub fn new(fft_size: usize) -> Self {
        debug_assert!(fft_size.is_power_of_two(), "FFT size must be a power of two");

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            fft_size,
            window: hann_window(fft_size, true),
            scratch,
            measurement: vec![Complex::new(0.0, 0.0); fft_size],
            reference: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Window and transform both channels of `block`
    ///
    /// Blocks shorter than the FFT size are zero-padded, longer ones truncated.
    pub fn process(&mut self, block: &StereoBlock) -> SpectrumPair<'_> {
        Self::load(&mut self.measurement, &block.measurement, &self.window);
        Self::load(&mut self.reference, &block.reference, &self.window);

        self.fft
            .process_with_scratch(&mut self.measurement, &mut self.scratch);
        self.fft
            .process_with_scratch(&mut self.reference, &mut self.scratch);

        SpectrumPair {
            measurement: &self.measurement,
            reference: &self.reference,
        }
    }

    fn load(target: &mut [Complex<f32>], samples: &[f32], window: &[f32]) {
        for (i, slot) in target.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * window[i], 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(9, false);
        assert!(window[0].abs() < 1e-6);
        assert!(window[8].abs() < 1e-6);
        assert!((window[4] - 1.0).abs() < 1e-6);
        // symmetric
        for i in 0..9 {
            assert!((window[i] - window[8 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalised_window_sums_to_size() {
        let window = hann_window(1024, true);
        let sum: f32 = window.iter().sum();
        assert!((sum - 1024.0).abs() < 0.1, "sum was {}", sum);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let n = 1024;
        let bin = 64;
        let mut block = StereoBlock::zeroed(n);
        for i in 0..n {
            let phase = 2.0 * std::f32::consts::PI * bin as f32 * i as f32 / n as f32;
            block.measurement[i] = phase.sin();
            block.reference[i] = 0.5 * phase.sin();
        }

        let mut transform = SpectralTransform::new(n);
        let spectra = transform.process(&block);

        let peak = spectra.measurement[..n / 2]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);

        // Unnormalised FFT of a windowed unit sine: ~N/2 at the peak bin
        let level = spectra.measurement[bin].norm() / n as f32;
        assert!((level - 0.5).abs() < 0.05, "level was {}", level);

        let ratio = spectra.reference[bin].norm() / spectra.measurement[bin].norm();
        assert!((ratio - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_short_block_is_zero_padded() {
        let mut transform = SpectralTransform::new(16);
        let block = StereoBlock::zeroed(4);
        let spectra = transform.process(&block);
        assert_eq!(spectra.measurement.len(), 16);
        assert!(spectra.measurement.iter().all(|c| c.norm() == 0.0));
    }
}
