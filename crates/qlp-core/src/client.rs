//! Controller side: discover devices and send them commands.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::protocol::codec::{decode_common_answer, decode_frame, encode_frame};
use crate::protocol::command::{ControlCommand, encode_control};
use crate::protocol::layout;
use crate::protocol::types::{CommonAnswer, PacketType};
use crate::transport::{DatagramTransport, TransportError};

const IDLE_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("discovery reply is not valid UTF-8")]
    NotText,
    #[error("discovery reply does not start with IAH")]
    MissingPrefix,
    #[error("discovery reply is missing the {0} field")]
    MissingField(&'static str),
    #[error("discovery reply has malformed {field}: {value:?}")]
    BadHex { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A device that answered a discovery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub addr: SocketAddr,
    pub device_id: u32,
    pub correlation: u32,
    pub name: String,
}

fn parse_hex_field(value: Option<&str>, field: &'static str) -> Result<u32, DiscoveryError> {
    let value = value.ok_or(DiscoveryError::MissingField(field))?;
    if value.len() != 8 {
        return Err(DiscoveryError::BadHex {
            field,
            value: value.to_string(),
        });
    }
    u32::from_str_radix(value, 16).map_err(|_| DiscoveryError::BadHex {
        field,
        value: value.to_string(),
    })
}

/// Parse an `IAH-{id}-{correlation}-{name}` discovery payload. The name may
/// itself contain dashes.
///
/// # Examples
/// ```
/// use qlp_core::parse_discovery_reply;
///
/// let addr = "10.0.0.7:52075".parse().unwrap();
/// let device = parse_discovery_reply(b"IAH-00C0FFEE-00001A2B-Desk-Lamp", addr).unwrap();
/// assert_eq!(device.device_id, 0x00C0FFEE);
/// assert_eq!(device.name, "Desk-Lamp");
/// ```
pub fn parse_discovery_reply(
    payload: &[u8],
    addr: SocketAddr,
) -> Result<DiscoveredDevice, DiscoveryError> {
    let text = std::str::from_utf8(payload).map_err(|_| DiscoveryError::NotText)?;
    let mut fields = text.splitn(4, '-');
    if fields.next() != Some(layout::DISCOVERY_REPLY_PREFIX) {
        return Err(DiscoveryError::MissingPrefix);
    }
    let device_id = parse_hex_field(fields.next(), "device id")?;
    let correlation = parse_hex_field(fields.next(), "correlation")?;
    let name = fields
        .next()
        .ok_or(DiscoveryError::MissingField("name"))?
        .to_string();
    Ok(DiscoveredDevice {
        addr,
        device_id,
        correlation,
        name,
    })
}

/// Broadcasts requests and collects replies on one transport.
pub struct Controller<T: DatagramTransport> {
    transport: T,
    broadcast: SocketAddr,
    buf: Vec<u8>,
    last_sent: Option<Vec<u8>>,
}

impl<T: DatagramTransport> Controller<T> {
    pub fn new(transport: T, broadcast: SocketAddr) -> Self {
        Self {
            transport,
            broadcast,
            buf: vec![0u8; layout::MAX_DATAGRAM_LEN],
            last_sent: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Broadcast an already encoded frame.
    pub fn send_frame(&mut self, frame: &[u8]) -> Result<(), ClientError> {
        self.transport.send_to(frame, self.broadcast)?;
        self.last_sent = Some(frame.to_vec());
        Ok(())
    }

    pub fn send(&mut self, device_id: u32, command: &ControlCommand) -> Result<(), ClientError> {
        debug!(device_id = %format!("{device_id:08X}"), ?command, "sending command");
        self.send_frame(&encode_control(device_id, command))
    }

    /// Broadcast a discovery request and collect replies until `timeout`.
    /// A device answering twice is reported once.
    pub fn discover(&mut self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, ClientError> {
        self.send_frame(&encode_frame(
            PacketType::Discovery,
            layout::DISCOVERY_REQUEST,
        ))?;
        let deadline = Instant::now() + timeout;
        let mut devices: Vec<DiscoveredDevice> = Vec::new();
        while let Some((len, from)) = self.next_datagram(deadline)? {
            let frame = match decode_frame(&self.buf[..len]) {
                Ok(frame) if frame.packet_type == PacketType::Discovery => frame,
                _ => continue,
            };
            match parse_discovery_reply(&frame.payload, from) {
                Ok(device) => {
                    if !devices.iter().any(|d| d.device_id == device.device_id) {
                        devices.push(device);
                    }
                }
                Err(err) => debug!(%from, error = %err, "ignoring discovery payload"),
            }
        }
        Ok(devices)
    }

    /// Wait for the next common answer, skipping typed frames and our own
    /// broadcast. `None` when nothing arrived before `timeout`.
    pub fn await_answer(&mut self, timeout: Duration) -> Result<Option<CommonAnswer>, ClientError> {
        let deadline = Instant::now() + timeout;
        while let Some((len, from)) = self.next_datagram(deadline)? {
            let datagram = &self.buf[..len];
            if datagram.get(layout::TYPE_OFFSET) == Some(&PacketType::Discovery.as_u8()) {
                continue;
            }
            match decode_common_answer(datagram) {
                Ok(answer) => return Ok(Some(answer)),
                Err(err) => debug!(%from, error = %err, "ignoring datagram"),
            }
        }
        Ok(None)
    }

    /// Next datagram that is not our own echo, or `None` at the deadline.
    fn next_datagram(
        &mut self,
        deadline: Instant,
    ) -> Result<Option<(usize, SocketAddr)>, ClientError> {
        loop {
            match self.transport.poll_recv(&mut self.buf)? {
                Some((len, from)) => {
                    if self.last_sent.as_deref() == Some(&self.buf[..len]) {
                        continue;
                    }
                    return Ok(Some((len, from)));
                }
                None => {
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                    std::thread::sleep(IDLE_BACKOFF);
                }
            }
        }
    }
}
