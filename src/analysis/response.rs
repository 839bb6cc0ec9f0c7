// Relative response - per-bucket level difference and phase difference
//
// For every bucket the selected bin of each spectrum is converted to dB
// (relative to the FFT size), clamped into [min_db, max_db] and mapped onto
// [0, 1]. The relative magnitude is (level_a - level_b + 1) / 2, so 0.5 means
// both channels sit at the same level. The phase is arg(A / B).

use rustfft::num_complex::Complex;

use super::mapping::FrequencyMapper;
use super::spectrum::SpectrumPair;
use super::{ResponseCurve, BUCKET_COUNT};

/// Floor used for silent bins when converting to decibels
pub const MINUS_INFINITY_DB: f32 = -100.0;

/// Gain to decibels with a floor for zero/negative gains
pub fn gain_to_decibels(gain: f32) -> f32 {
    if gain > 0.0 {
        (20.0 * gain.log10()).max(MINUS_INFINITY_DB)
    } else {
        MINUS_INFINITY_DB
    }
}

/// Wrapped phase of `measurement / reference` in (-pi, pi]
///
/// A silent reference bin has no defined ratio; the phase is 0 there.
pub fn phase_difference(measurement: Complex<f32>, reference: Complex<f32>) -> f32 {
    if reference.norm_sqr() == 0.0 {
        return 0.0;
    }
    // arg(a / b) == arg(a * conj(b)) since |b|^2 is a positive real
    let phase = (measurement * reference.conj()).arg();
    if phase <= -std::f32::consts::PI {
        std::f32::consts::PI
    } else {
        phase
    }
}

/// Computes relative magnitude and phase curves from a spectrum pair
#[derive(Debug, Clone)]
pub struct RelativeResponseComputer {
    min_db: f32,
    max_db: f32,
    fft_size_db: f32,
}

impl RelativeResponseComputer {
    pub fn new(fft_size: usize, min_db: f32, max_db: f32) -> Self {
        Self {
            min_db,
            max_db,
            fft_size_db: gain_to_decibels(fft_size as f32),
        }
    }

    /// Normalised level in [0, 1] of one FFT bin
    pub fn level(&self, bin: Complex<f32>) -> f32 {
        let db = gain_to_decibels(bin.norm()) - self.fft_size_db;
        let clamped = db.clamp(self.min_db, self.max_db);
        (clamped - self.min_db) / (self.max_db - self.min_db)
    }

    /// Relative magnitude from two normalised levels
    pub fn relative_magnitude(level_measurement: f32, level_reference: f32) -> f32 {
        ((level_measurement - level_reference + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    /// Build the raw response curve for one block
    pub fn compute(&self, spectra: &SpectrumPair<'_>, mapper: &FrequencyMapper) -> ResponseCurve {
        let mut curve = ResponseCurve::zeroed();

        for bucket in 0..BUCKET_COUNT {
            let bin = mapper.bin(bucket);
            let a = spectra.measurement[bin];
            let b = spectra.reference[bin];

            curve.magnitude[bucket] = Self::relative_magnitude(self.level(a), self.level(b));
            curve.phase[bucket] = phase_difference(a, b);
        }

        curve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn computer() -> RelativeResponseComputer {
        RelativeResponseComputer::new(8192, -60.0, -40.0)
    }

    /// Complex bin whose level sits at `db` relative to an 8192-point FFT
    fn bin_at_db(db: f32) -> Complex<f32> {
        Complex::new(8192.0 * 10f32.powf(db / 20.0), 0.0)
    }

    #[test]
    fn test_gain_to_decibels() {
        assert!((gain_to_decibels(1.0)).abs() < 1e-6);
        assert!((gain_to_decibels(10.0) - 20.0).abs() < 1e-5);
        assert_eq!(gain_to_decibels(0.0), MINUS_INFINITY_DB);
        assert_eq!(gain_to_decibels(1e-9), MINUS_INFINITY_DB);
    }

    #[test]
    fn test_level_maps_db_window() {
        let c = computer();
        assert!((c.level(bin_at_db(-60.0))).abs() < 1e-4);
        assert!((c.level(bin_at_db(-50.0)) - 0.5).abs() < 1e-4);
        assert!((c.level(bin_at_db(-40.0)) - 1.0).abs() < 1e-4);
        assert_eq!(c.level(bin_at_db(-20.0)), 1.0);
        assert_eq!(c.level(Complex::new(0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_equal_levels_give_half() {
        assert_eq!(RelativeResponseComputer::relative_magnitude(0.3, 0.3), 0.5);
        assert_eq!(RelativeResponseComputer::relative_magnitude(1.0, 0.0), 1.0);
        assert_eq!(RelativeResponseComputer::relative_magnitude(0.0, 1.0), 0.0);
        assert!((RelativeResponseComputer::relative_magnitude(0.75, 0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_phase_difference() {
        let a = Complex::new(0.0, 1.0);
        let b = Complex::new(1.0, 0.0);
        assert!((phase_difference(a, b) - FRAC_PI_2).abs() < 1e-6);
        assert!((phase_difference(b, a) + FRAC_PI_2).abs() < 1e-6);
        assert!(phase_difference(b, b).abs() < 1e-6);
    }

    #[test]
    fn test_phase_zero_reference_is_defined() {
        let phase = phase_difference(Complex::new(0.3, -0.7), Complex::new(0.0, 0.0));
        assert_eq!(phase, 0.0);
    }

    #[test]
    fn test_phase_range_excludes_minus_pi() {
        // -1 / 1 with a negative-zero imaginary part would give -pi from atan2
        let phase = phase_difference(Complex::new(-1.0, -0.0), Complex::new(1.0, 0.0));
        assert!((phase - PI).abs() < 1e-6);
    }

    #[test]
    fn test_compute_uses_mapped_bins() {
        let c = computer();
        let mapper = FrequencyMapper::new(48_000, 8192);
        let mut measurement = vec![Complex::new(0.0, 0.0); 8192];
        let mut reference = vec![Complex::new(0.0, 0.0); 8192];
        for bin in 0..=4096 {
            measurement[bin] = bin_at_db(-45.0) * Complex::new(0.0, 1.0);
            reference[bin] = bin_at_db(-55.0);
        }

        let spectra = SpectrumPair {
            measurement: &measurement,
            reference: &reference,
        };
        let curve = c.compute(&spectra, &mapper);
        for bucket in 0..BUCKET_COUNT {
            // levels 0.75 and 0.25
            assert!((curve.magnitude[bucket] - 0.75).abs() < 1e-3);
            assert!((curve.phase[bucket] - FRAC_PI_2).abs() < 1e-4);
        }
    }
}
