// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes;

impl AudioErrorCodes {
    /// Analysis pipeline is already running
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Analysis pipeline is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1003;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1004;

    /// Input device offers fewer than two channels
    pub const CHANNELS_UNAVAILABLE: i32 = 1005;

    /// Source is not running at the fixed analysis rate
    pub const UNSUPPORTED_SAMPLE_RATE: i32 = 1006;

    /// Audio file could not be decoded
    pub const DECODE_FAILED: i32 = 1007;

    /// Analysis thread could not be started or joined
    pub const THREAD_FAILURE: i32 = 1008;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioInput, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover the sample providers (live device, WAV replay) and the
/// lifecycle of the analysis thread.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Analysis pipeline is already running
    AlreadyRunning,

    /// Analysis pipeline is not running
    NotRunning,

    /// Hardware error occurred
    HardwareError { details: String },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Input device offers fewer than two channels
    ChannelsUnavailable { required: u16, available: u16 },

    /// Source sample rate differs from the analysis rate
    UnsupportedSampleRate { expected: u32, actual: u32 },

    /// Audio file could not be read or decoded
    DecodeFailed { reason: String },

    /// Analysis thread could not be spawned or panicked
    ThreadFailure { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::ChannelsUnavailable { .. } => AudioErrorCodes::CHANNELS_UNAVAILABLE,
            AudioError::UnsupportedSampleRate { .. } => AudioErrorCodes::UNSUPPORTED_SAMPLE_RATE,
            AudioError::DecodeFailed { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::ThreadFailure { .. } => AudioErrorCodes::THREAD_FAILURE,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Analysis already running. Call stop_analysis() first.".to_string()
            }
            AudioError::NotRunning => {
                "Analysis not running. Call start_analysis() first.".to_string()
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::ChannelsUnavailable {
                required,
                available,
            } => {
                format!(
                    "Input needs {} channels (measurement + reference), device has {}",
                    required, available
                )
            }
            AudioError::UnsupportedSampleRate { expected, actual } => {
                format!(
                    "Sample rate must be {} Hz (got {} Hz)",
                    expected, actual
                )
            }
            AudioError::DecodeFailed { reason } => {
                format!("Failed to decode audio: {}", reason)
            }
            AudioError::ThreadFailure { reason } => {
                format!("Analysis thread failure: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::DecodeFailed {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::AlreadyRunning.code(),
            AudioErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(AudioError::NotRunning.code(), AudioErrorCodes::NOT_RUNNING);
        assert_eq!(
            AudioError::ChannelsUnavailable {
                required: 2,
                available: 1
            }
            .code(),
            AudioErrorCodes::CHANNELS_UNAVAILABLE
        );
        assert_eq!(
            AudioError::UnsupportedSampleRate {
                expected: 48000,
                actual: 44100
            }
            .code(),
            AudioErrorCodes::UNSUPPORTED_SAMPLE_RATE
        );
        assert_eq!(
            AudioError::DecodeFailed {
                reason: "test".to_string()
            }
            .code(),
            1007
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::UnsupportedSampleRate {
            expected: 48000,
            actual: 44100,
        };
        assert_eq!(err.message(), "Sample rate must be 48000 Hz (got 44100 Hz)");

        let err = AudioError::NotRunning;
        assert!(err.message().contains("not running"));

        let err = AudioError::ChannelsUnavailable {
            required: 2,
            available: 1,
        };
        assert!(err.message().contains("device has 1"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::AlreadyRunning;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("test io error");
        let audio_err: AudioError = io_err.into();
        match audio_err {
            AudioError::HardwareError { details } => {
                assert!(details.contains("test io error"));
            }
            _ => panic!("Expected HardwareError"),
        }
    }
}
