// Error types for the dual-channel analyser
//
// This module defines custom error types for audio input and console
// transport operations, providing structured error handling with numeric
// error codes that the CLI and any front-end can report consistently.

mod audio;
mod console;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use console::{log_console_error, ConsoleError, ConsoleErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
