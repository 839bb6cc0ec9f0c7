//! WAV replay - feeds a recorded stereo file through the accumulator
//!
//! Channel 0 is taken as the measurement and channel 1 as the reference,
//! the same assignment the live input uses.

use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::analysis::SAMPLE_RATE;
use crate::error::AudioError;

/// De-interleaved stereo recording held in memory
#[derive(Debug, Clone)]
pub struct WavReplay {
    measurement: Vec<f32>,
    reference: Vec<f32>,
}

impl WavReplay {
    /// Decode a stereo WAV at the analysis sample rate
    ///
    /// # Errors
    /// - `DecodeFailed` when the file cannot be read
    /// - `ChannelsUnavailable` for mono files
    /// - `UnsupportedSampleRate` when the file is not 48 kHz
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let mut reader = WavReader::open(path.as_ref())?;
        let spec = reader.spec();

        if spec.channels < 2 {
            return Err(AudioError::ChannelsUnavailable {
                required: 2,
                available: spec.channels,
            });
        }
        if spec.sample_rate != SAMPLE_RATE {
            return Err(AudioError::UnsupportedSampleRate {
                expected: SAMPLE_RATE,
                actual: spec.sample_rate,
            });
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let channels = spec.channels as usize;
        let frames = interleaved.len() / channels;
        let mut measurement = Vec::with_capacity(frames);
        let mut reference = Vec::with_capacity(frames);
        for frame in interleaved.chunks_exact(channels) {
            measurement.push(frame[0]);
            reference.push(frame[1]);
        }

        tracing::info!(
            "[WavReplay] Loaded {} frames ({} channels, {} bit {:?}) from {}",
            frames,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format,
            path.as_ref().display()
        );

        Ok(Self {
            measurement,
            reference,
        })
    }

    /// Build a replay from already de-interleaved channels
    pub fn from_channels(measurement: Vec<f32>, reference: Vec<f32>) -> Self {
        let frames = measurement.len().min(reference.len());
        let mut measurement = measurement;
        let mut reference = reference;
        measurement.truncate(frames);
        reference.truncate(frames);
        Self {
            measurement,
            reference,
        }
    }

    pub fn frames(&self) -> usize {
        self.measurement.len()
    }

    pub fn measurement(&self) -> &[f32] {
        &self.measurement
    }

    pub fn reference(&self) -> &[f32] {
        &self.reference
    }

    /// Write the recording as a 32-bit float stereo WAV
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), AudioError> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for (&a, &b) in self.measurement.iter().zip(self.reference.iter()) {
            writer.write_sample(a)?;
            writer.write_sample(b)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rta_autoeq_{}_{}.wav", name, std::process::id()))
    }

    #[test]
    fn test_float_roundtrip_keeps_channel_order() {
        let path = temp_path("float");
        let replay = WavReplay::from_channels(vec![0.1, 0.2, 0.3], vec![-0.1, -0.2, -0.3]);
        replay.write(&path).unwrap();

        let loaded = WavReplay::open(&path).unwrap();
        assert_eq!(loaded.frames(), 3);
        assert_eq!(loaded.measurement(), &[0.1, 0.2, 0.3]);
        assert_eq!(loaded.reference(), &[-0.1, -0.2, -0.3]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_int_samples_are_scaled() {
        let path = temp_path("int16");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384_i16).unwrap();
        writer.write_sample(-32768_i16).unwrap();
        writer.finalize().unwrap();

        let loaded = WavReplay::open(&path).unwrap();
        assert!((loaded.measurement()[0] - 0.5).abs() < 1e-6);
        assert!((loaded.reference()[0] + 1.0).abs() < 1e-6);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_wrong_sample_rate() {
        let path = temp_path("rate");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0_i16).unwrap();
        writer.write_sample(0_i16).unwrap();
        writer.finalize().unwrap();

        match WavReplay::open(&path) {
            Err(AudioError::UnsupportedSampleRate { expected, actual }) => {
                assert_eq!(expected, 48000);
                assert_eq!(actual, 44100);
            }
            other => panic!("Expected UnsupportedSampleRate, got {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_mono() {
        let path = temp_path("mono");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0_i16).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            WavReplay::open(&path),
            Err(AudioError::ChannelsUnavailable { available: 1, .. })
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        assert!(matches!(
            WavReplay::open("no/such/file.wav"),
            Err(AudioError::DecodeFailed { .. })
        ));
    }
}
