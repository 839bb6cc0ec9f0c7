//! OSC over UDP transport.
//!
//! One datagram per message, no bundles, no acknowledgement. The socket is
//! bound once; the console address can be changed while running.

use std::net::{SocketAddr, UdpSocket};
use std::sync::RwLock;

use rosc::{encoder, OscMessage, OscPacket, OscType};

use super::{resolve_address, ConsoleTransport, ConsoleValue};
use crate::error::ConsoleError;

impl From<ConsoleValue> for OscType {
    fn from(value: ConsoleValue) -> Self {
        match value {
            ConsoleValue::Float(v) => OscType::Float(v),
            ConsoleValue::Int(v) => OscType::Int(v),
            ConsoleValue::Bool(v) => OscType::Bool(v),
            ConsoleValue::Str(v) => OscType::String(v),
        }
    }
}

/// UDP socket sending OSC messages to one console
pub struct OscTransport {
    socket: UdpSocket,
    target: RwLock<SocketAddr>,
}

impl OscTransport {
    /// Bind `0.0.0.0:bind_port` and aim at `target` (`ip:port`)
    pub fn bind(bind_port: u16, target: &str) -> Result<Self, ConsoleError> {
        let target = resolve_address(target)?;
        let socket =
            UdpSocket::bind(("0.0.0.0", bind_port)).map_err(|e| ConsoleError::BindFailed {
                port: bind_port,
                reason: e.to_string(),
            })?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ConsoleError::BindFailed {
                port: bind_port,
                reason: e.to_string(),
            })?;

        tracing::info!(
            "[Console] OSC socket bound on {:?}, sending to {}",
            socket.local_addr().ok(),
            target
        );

        Ok(Self {
            socket,
            target: RwLock::new(target),
        })
    }

    pub fn target(&self) -> Result<SocketAddr, ConsoleError> {
        self.target
            .read()
            .map(|target| *target)
            .map_err(|_| ConsoleError::LockPoisoned {
                component: "OscTransport".to_string(),
            })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

impl ConsoleTransport for OscTransport {
    fn send(&self, path: &str, value: ConsoleValue) -> Result<(), ConsoleError> {
        let packet = OscPacket::Message(OscMessage {
            addr: path.to_string(),
            args: vec![value.into()],
        });
        let bytes = encoder::encode(&packet).map_err(|e| ConsoleError::EncodeFailed {
            path: path.to_string(),
            reason: format!("{:?}", e),
        })?;

        let target = self.target()?;
        self.socket
            .send_to(&bytes, target)
            .map_err(|e| ConsoleError::SendFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!("[Console] -> {} {}", target, path);
        Ok(())
    }

    fn retarget(&self, address: &str) -> Result<SocketAddr, ConsoleError> {
        let resolved = resolve_address(address)?;
        let mut target = self
            .target
            .write()
            .map_err(|_| ConsoleError::LockPoisoned {
                component: "OscTransport".to_string(),
            })?;
        *target = resolved;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn receiver() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    fn receive(socket: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 1024];
        let (len, _) = socket.recv_from(&mut buf).unwrap();
        match rosc::decoder::decode_udp(&buf[..len]).unwrap().1 {
            OscPacket::Message(message) => message,
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn test_sends_osc_message_to_target() {
        let console = receiver();
        let target = console.local_addr().unwrap().to_string();
        let transport = OscTransport::bind(0, &target).unwrap();

        transport
            .send("/main/st/eq/2/f", ConsoleValue::Str("1000".to_string()))
            .unwrap();

        let message = receive(&console);
        assert_eq!(message.addr, "/main/st/eq/2/f");
        assert_eq!(message.args, vec![OscType::String("1000".to_string())]);
    }

    #[test]
    fn test_retarget_moves_traffic() {
        let first = receiver();
        let second = receiver();
        let transport =
            OscTransport::bind(0, &first.local_addr().unwrap().to_string()).unwrap();

        let moved = transport
            .retarget(&second.local_addr().unwrap().to_string())
            .unwrap();
        assert_eq!(moved, second.local_addr().unwrap());

        transport
            .send("/main/st/mix/fader", ConsoleValue::Float(0.75))
            .unwrap();
        let message = receive(&second);
        assert_eq!(message.args, vec![OscType::Float(0.75)]);
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let err = OscTransport::bind(0, "not an address").err().unwrap();
        assert!(matches!(err, ConsoleError::InvalidAddress { .. }));
    }
}
