// Console transport error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Console error code constants
///
/// Error code range: 2001-2005
pub struct ConsoleErrorCodes;

impl ConsoleErrorCodes {
    /// Local control socket could not be bound
    pub const BIND_FAILED: i32 = 2001;

    /// Console address could not be parsed or resolved
    pub const INVALID_ADDRESS: i32 = 2002;

    /// Message could not be encoded
    pub const ENCODE_FAILED: i32 = 2003;

    /// Datagram could not be sent
    pub const SEND_FAILED: i32 = 2004;

    /// Transport state lock was poisoned
    pub const LOCK_POISONED: i32 = 2005;
}

/// Log a console error with structured context
pub fn log_console_error(err: &ConsoleError, context: &str) {
    error!(
        "Console error in {}: code={}, component=ConsoleTransport, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while talking to the mixing console
///
/// Sends are best-effort: callers log these and carry on, nothing retries.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleError {
    /// Local control socket could not be bound
    BindFailed { port: u16, reason: String },

    /// Console address could not be parsed or resolved
    InvalidAddress { address: String },

    /// Message could not be encoded
    EncodeFailed { path: String, reason: String },

    /// Datagram could not be sent
    SendFailed { path: String, reason: String },

    /// Transport state lock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for ConsoleError {
    fn code(&self) -> i32 {
        match self {
            ConsoleError::BindFailed { .. } => ConsoleErrorCodes::BIND_FAILED,
            ConsoleError::InvalidAddress { .. } => ConsoleErrorCodes::INVALID_ADDRESS,
            ConsoleError::EncodeFailed { .. } => ConsoleErrorCodes::ENCODE_FAILED,
            ConsoleError::SendFailed { .. } => ConsoleErrorCodes::SEND_FAILED,
            ConsoleError::LockPoisoned { .. } => ConsoleErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            ConsoleError::BindFailed { port, reason } => {
                format!("Failed to bind control port {}: {}", port, reason)
            }
            ConsoleError::InvalidAddress { address } => {
                format!("Invalid console address: {}", address)
            }
            ConsoleError::EncodeFailed { path, reason } => {
                format!("Failed to encode {}: {}", path, reason)
            }
            ConsoleError::SendFailed { path, reason } => {
                format!("Failed to send {}: {}", path, reason)
            }
            ConsoleError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
        }
    }
}

impl ConsoleError {
    /// Message path the error refers to, when there is one
    pub fn path(&self) -> Option<&str> {
        match self {
            ConsoleError::EncodeFailed { path, .. } | ConsoleError::SendFailed { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConsoleError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConsoleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_error_codes() {
        assert_eq!(
            ConsoleError::BindFailed {
                port: 10022,
                reason: "in use".to_string()
            }
            .code(),
            ConsoleErrorCodes::BIND_FAILED
        );
        assert_eq!(
            ConsoleError::SendFailed {
                path: "/main/st/eq/2/g".to_string(),
                reason: "unreachable".to_string()
            }
            .code(),
            2004
        );
    }

    #[test]
    fn test_console_error_messages() {
        let err = ConsoleError::InvalidAddress {
            address: "not-an-ip".to_string(),
        };
        assert_eq!(err.message(), "Invalid console address: not-an-ip");

        let err = ConsoleError::SendFailed {
            path: "/main/st/eq/2/g".to_string(),
            reason: "unreachable".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("ConsoleError"));
        assert!(display.contains("2004"));
        assert!(display.contains("/main/st/eq/2/g"));
    }
}
