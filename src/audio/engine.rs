//! Live dual-channel capture through cpal
//!
//! Opens an input device with at least two channels at the fixed analysis
//! rate and pushes channel 0 (measurement) and channel 1 (reference) into the
//! [`SampleAccumulator`] from the device callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::accumulator::SampleAccumulator;
use crate::analysis::SAMPLE_RATE;
use crate::error::AudioError;

/// Summary of an input device for listings
#[derive(Debug, Clone, serde::Serialize)]
pub struct InputDeviceInfo {
    pub name: String,
    pub max_channels: u16,
    pub supports_analysis_rate: bool,
}

/// List input devices on the default host
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::HardwareError {
            details: format!("Failed to enumerate input devices: {}", e),
        })?;

    let mut infos = Vec::new();
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let mut max_channels = 0;
        let mut supports_analysis_rate = false;
        if let Ok(configs) = device.supported_input_configs() {
            for range in configs {
                max_channels = max_channels.max(range.channels());
                if range.channels() >= 2
                    && range.min_sample_rate().0 <= SAMPLE_RATE
                    && range.max_sample_rate().0 >= SAMPLE_RATE
                {
                    supports_analysis_rate = true;
                }
            }
        }
        infos.push(InputDeviceInfo {
            name,
            max_channels,
            supports_analysis_rate,
        });
    }
    Ok(infos)
}

/// Owns the running cpal input stream
pub struct AudioEngine {
    input_stream: Option<cpal::Stream>,
    device_name: String,
}

impl AudioEngine {
    /// Open `device_name` (or the default input) and start streaming into `accumulator`
    pub fn start(
        device_name: Option<&str>,
        mut accumulator: SampleAccumulator,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(wanted) => host
                .input_devices()
                .map_err(|e| AudioError::HardwareError {
                    details: format!("Failed to enumerate input devices: {}", e),
                })?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| AudioError::StreamOpenFailed {
                    reason: format!("Input device {:?} not found", wanted),
                })?,
            None => host
                .default_input_device()
                .ok_or_else(|| AudioError::StreamOpenFailed {
                    reason: "No default input device found".to_string(),
                })?,
        };
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let supported = device
            .supported_input_configs()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to query input configs: {:?}", e),
            })?
            .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
            .filter(|range| {
                range.min_sample_rate().0 <= SAMPLE_RATE && range.max_sample_rate().0 >= SAMPLE_RATE
            })
            .max_by_key(|range| range.channels());

        let range = supported.ok_or(AudioError::UnsupportedSampleRate {
            expected: SAMPLE_RATE,
            actual: device
                .default_input_config()
                .map(|c| c.sample_rate().0)
                .unwrap_or(0),
        })?;
        if range.channels() < 2 {
            return Err(AudioError::ChannelsUnavailable {
                required: 2,
                available: range.channels(),
            });
        }

        let config = range.with_sample_rate(cpal::SampleRate(SAMPLE_RATE));
        let stream_config: cpal::StreamConfig = config.into();
        let channels_count = stream_config.channels as usize;

        let err_fn = |err: cpal::StreamError| {
            tracing::warn!("[AudioEngine] Input stream error: {}", err)
        };

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Real-time callback - NO ALLOCATIONS, LOCKS, OR BLOCKING!
                    accumulator.push_interleaved(data, channels_count);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("{:?}", e),
            })?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        tracing::info!(
            "[AudioEngine] Capturing {} channels at {} Hz from {:?}",
            channels_count,
            SAMPLE_RATE,
            name
        );

        Ok(Self {
            input_stream: Some(stream),
            device_name: name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn stop(&mut self) {
        if let Some(stream) = self.input_stream.take() {
            drop(stream);
            tracing::info!("[AudioEngine] Input stream closed");
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
