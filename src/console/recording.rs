// Recording transport - keeps every message in memory instead of sending it

use std::net::SocketAddr;
use std::sync::Mutex;

use serde::Serialize;

use super::{resolve_address, ConsoleTransport, ConsoleValue};
use crate::error::ConsoleError;

/// One message captured by a `RecordingTransport`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedMessage {
    pub path: String,
    pub value: ConsoleValue,
}

/// In-memory transport for tests and dry runs
#[derive(Debug, Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<RecordedMessage>>,
    fail_path: Option<String>,
    target: Mutex<Option<SocketAddr>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that rejects every send to `path`
    pub fn failing_on(path: &str) -> Self {
        Self {
            fail_path: Some(path.to_string()),
            ..Self::default()
        }
    }

    /// Copy of everything recorded so far
    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Last address passed to `retarget`, if any
    pub fn target(&self) -> Option<SocketAddr> {
        self.target.lock().ok().and_then(|target| *target)
    }

    pub fn clear(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.clear();
        }
    }
}

impl ConsoleTransport for RecordingTransport {
    fn send(&self, path: &str, value: ConsoleValue) -> Result<(), ConsoleError> {
        if self.fail_path.as_deref() == Some(path) {
            return Err(ConsoleError::SendFailed {
                path: path.to_string(),
                reason: "rejected by recording transport".to_string(),
            });
        }

        let mut messages = self
            .messages
            .lock()
            .map_err(|_| ConsoleError::LockPoisoned {
                component: "RecordingTransport".to_string(),
            })?;
        messages.push(RecordedMessage {
            path: path.to_string(),
            value,
        });
        Ok(())
    }

    fn retarget(&self, address: &str) -> Result<SocketAddr, ConsoleError> {
        let resolved = resolve_address(address)?;
        let mut target = self
            .target
            .lock()
            .map_err(|_| ConsoleError::LockPoisoned {
                component: "RecordingTransport".to_string(),
            })?;
        *target = Some(resolved);
        Ok(resolved)
    }
}
