//! Console control plane.
//!
//! The analyser talks to the mixing desk through `(path, value)` messages.
//! `ConsoleTransport` is the seam: `OscTransport` sends OSC over UDP,
//! `RecordingTransport` keeps messages in memory. `ConsoleClient` builds the
//! desk-specific paths on top of either.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::eq::EqBand;
use crate::error::ConsoleError;

pub mod osc;
pub mod recording;

pub use osc::OscTransport;
pub use recording::{RecordedMessage, RecordingTransport};

/// One argument value on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConsoleValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Str(String),
}

/// How numeric parameters are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueEncoding {
    /// Decimal text arguments ("1000", "2.2", "-15")
    #[default]
    Text,
    /// 32-bit float arguments
    Float,
}

impl ValueEncoding {
    pub fn encode(self, value: f32) -> ConsoleValue {
        match self {
            ValueEncoding::Text => ConsoleValue::Str(format!("{}", value)),
            ValueEncoding::Float => ConsoleValue::Float(value),
        }
    }

    /// Encode a value that the text encoding writes verbatim (e.g. "0.3750")
    fn encode_literal(self, text: &str, value: f32) -> ConsoleValue {
        match self {
            ValueEncoding::Text => ConsoleValue::Str(text.to_string()),
            ValueEncoding::Float => ConsoleValue::Float(value),
        }
    }
}

/// Fire-and-forget delivery of one message
pub trait ConsoleTransport: Send + Sync {
    fn send(&self, path: &str, value: ConsoleValue) -> Result<(), ConsoleError>;

    /// Point subsequent sends at another console (`ip:port`)
    fn retarget(&self, address: &str) -> Result<SocketAddr, ConsoleError>;
}

/// First socket address `address` resolves to
pub(crate) fn resolve_address(address: &str) -> Result<SocketAddr, ConsoleError> {
    address
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConsoleError::InvalidAddress {
            address: address.to_string(),
        })
}

/// Counts of a batch of sends; failures are kept for logging
#[derive(Debug, Default)]
pub struct SendReport {
    pub sent: usize,
    pub failures: Vec<ConsoleError>,
}

impl SendReport {
    fn record(&mut self, result: Result<(), ConsoleError>) {
        match result {
            Ok(()) => self.sent += 1,
            Err(err) => self.failures.push(err),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Main stereo bus EQ path for `slot` and parameter `param` (f, q or g)
pub fn main_eq_path(slot: usize, param: char) -> String {
    format!("/main/st/eq/{}/{}", slot, param)
}

/// Desk-level operations on top of a transport
#[derive(Clone)]
pub struct ConsoleClient {
    transport: Arc<dyn ConsoleTransport>,
    encoding: ValueEncoding,
}

impl ConsoleClient {
    pub fn new(transport: Arc<dyn ConsoleTransport>, encoding: ValueEncoding) -> Self {
        Self {
            transport,
            encoding,
        }
    }

    pub fn encoding(&self) -> ValueEncoding {
        self.encoding
    }

    pub fn send(&self, path: &str, value: ConsoleValue) -> Result<(), ConsoleError> {
        self.transport.send(path, value)
    }

    /// Change the console address while running
    pub fn retarget(&self, address: &str) -> Result<SocketAddr, ConsoleError> {
        let resolved = self.transport.retarget(address)?;
        tracing::info!("[Console] Console address changed to {}", resolved);
        Ok(resolved)
    }

    pub fn set_band_frequency(&self, slot: usize, hz: f32) -> Result<(), ConsoleError> {
        self.send(&main_eq_path(slot, 'f'), self.encoding.encode(hz))
    }

    pub fn set_band_q(&self, slot: usize, q: f32) -> Result<(), ConsoleError> {
        self.send(&main_eq_path(slot, 'q'), self.encoding.encode(q))
    }

    pub fn set_band_gain(&self, slot: usize, db: f32) -> Result<(), ConsoleError> {
        self.send(&main_eq_path(slot, 'g'), self.encoding.encode(db))
    }

    /// Frequency, Q then gain for every band; a failed send does not stop the rest
    pub fn send_bands(&self, bands: &[EqBand]) -> SendReport {
        let mut report = SendReport::default();
        for band in bands {
            report.record(self.set_band_frequency(band.slot, band.frequency_hz));
            report.record(self.set_band_q(band.slot, band.q));
            report.record(self.set_band_gain(band.slot, band.gain_db));
        }
        report
    }

    /// Zero the gain of slots `1..=slots`
    pub fn reset_band_gains(&self, slots: usize) -> SendReport {
        let mut report = SendReport::default();
        for slot in 1..=slots {
            let zero = self.encoding.encode_literal("0", 0.0);
            report.record(self.send(&main_eq_path(slot, 'g'), zero));
        }
        report
    }

    /// Main stereo fader level (0.0-1.0)
    pub fn set_main_fader(&self, level: f32) -> Result<(), ConsoleError> {
        self.send("/main/st/mix/fader", self.encoding.encode(level))
    }

    /// Zero the four channel EQ gains of input channel `channel` ("01", "02", ...)
    fn reset_channel_eq(&self, channel: &str, report: &mut SendReport) {
        for band in 1..=4 {
            let path = format!("/ch/{}/eq/{}/g", channel, band);
            report.record(self.send(&path, self.encoding.encode_literal("0", 0.0)));
        }
    }

    /// Route the desk for a self-test run
    ///
    /// Mutes the main fader, zeroes the managed main EQ gains, turns on the
    /// internal oscillator into bus 12, feeds it to channel 2 and patches the
    /// main outputs and card routing so both signals reach the analyser.
    pub fn prepare_self_test(&self, managed_slots: usize) -> SendReport {
        let e = self.encoding;
        let mut report = SendReport::default();

        report.record(self.send("/main/st/mix/on", e.encode_literal("1", 1.0)));
        report.record(self.send("/main/st/mix/fader", e.encode_literal("-90.0", -90.0)));
        let reset = self.reset_band_gains(managed_slots);
        report.sent += reset.sent;
        report.failures.extend(reset.failures);

        let routing: [(&str, &str, f32); 11] = [
            ("/bus/12/mix/on", "1", 1.0),
            ("/config/osc/level", "0.3750", 0.375),
            ("/config/osc/type", "1", 1.0),
            ("/config/osc/dest", "11", 11.0),
            ("/-stat/osc/on", "1", 1.0),
            ("/bus/12/mix/fader", "0.7478", 0.7478),
            ("/outputs/main/02/src", "15", 15.0),
            ("/ch/02/source", "60", 60.0),
            ("/ch/02/preamp/trim", "0.0", 0.0),
            ("/ch/02/mix/on", "1", 1.0),
            ("/ch/02/mix/fader", "0.0", 0.0),
        ];
        for (path, text, value) in routing {
            report.record(self.send(path, e.encode_literal(text, value)));
        }

        self.reset_channel_eq("02", &mut report);
        self.reset_channel_eq("01", &mut report);

        report.record(self.send("/outputs/main/01/src", e.encode_literal("26", 26.0)));
        report.record(self.send("/config/routing/CARD/1-8", e.encode_literal("20", 20.0)));

        tracing::info!(
            "[Console] Self-test routing sent ({} ok, {} failed)",
            report.sent,
            report.failures.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(encoding: ValueEncoding) -> (ConsoleClient, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        (ConsoleClient::new(transport.clone(), encoding), transport)
    }

    fn band(slot: usize) -> EqBand {
        EqBand {
            slot,
            frequency_hz: 1000.0,
            q: 2.2,
            gain_db: -15.0,
            center_bucket: 100,
            peak_count: 2,
        }
    }

    #[test]
    fn test_band_sends_frequency_q_gain_as_text() {
        let (client, transport) = client(ValueEncoding::Text);
        let report = client.send_bands(&[band(2)]);
        assert_eq!(report.sent, 3);
        assert!(report.is_clean());

        let messages = transport.messages();
        assert_eq!(messages[0].path, "/main/st/eq/2/f");
        assert_eq!(messages[0].value, ConsoleValue::Str("1000".to_string()));
        assert_eq!(messages[1].path, "/main/st/eq/2/q");
        assert_eq!(messages[1].value, ConsoleValue::Str("2.2".to_string()));
        assert_eq!(messages[2].path, "/main/st/eq/2/g");
        assert_eq!(messages[2].value, ConsoleValue::Str("-15".to_string()));
    }

    #[test]
    fn test_float_encoding() {
        let (client, transport) = client(ValueEncoding::Float);
        client.set_band_gain(3, -5.0).unwrap();
        assert_eq!(transport.messages()[0].value, ConsoleValue::Float(-5.0));
    }

    #[test]
    fn test_reset_zeroes_managed_slots() {
        let (client, transport) = client(ValueEncoding::Text);
        let report = client.reset_band_gains(6);
        assert_eq!(report.sent, 6);

        let paths: Vec<String> = transport.messages().into_iter().map(|m| m.path).collect();
        let expected: Vec<String> = (1..=6).map(|s| format!("/main/st/eq/{}/g", s)).collect();
        assert_eq!(paths, expected);
        assert!(transport
            .messages()
            .iter()
            .all(|m| m.value == ConsoleValue::Str("0".to_string())));
    }

    #[test]
    fn test_self_test_routing_sequence() {
        let (client, transport) = client(ValueEncoding::Text);
        let report = client.prepare_self_test(6);
        let messages = transport.messages();

        // 2 main + 6 resets + 11 routing + 8 channel EQ + 2 outputs
        assert_eq!(report.sent, 29);
        assert_eq!(messages.len(), 29);
        assert_eq!(messages[0].path, "/main/st/mix/on");
        assert_eq!(messages[1].path, "/main/st/mix/fader");
        assert_eq!(messages[1].value, ConsoleValue::Str("-90.0".to_string()));
        assert_eq!(messages[2].path, "/main/st/eq/1/g");
        assert_eq!(messages[8].path, "/bus/12/mix/on");
        let osc_level = ConsoleValue::Str("0.3750".to_string());
        assert!(messages
            .iter()
            .any(|m| m.path == "/config/osc/level" && m.value == osc_level));
        assert_eq!(messages[19].path, "/ch/02/eq/1/g");
        assert_eq!(messages[23].path, "/ch/01/eq/1/g");
        assert_eq!(messages[28].path, "/config/routing/CARD/1-8");
    }

    #[test]
    fn test_failed_sends_are_reported_not_fatal() {
        let transport = Arc::new(RecordingTransport::failing_on("/main/st/eq/2/q"));
        let client = ConsoleClient::new(transport.clone(), ValueEncoding::Text);
        let report = client.send_bands(&[band(2)]);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(transport.messages().len(), 2);
    }
}
