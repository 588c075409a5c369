//! Reply encoding and delivery.

use std::net::SocketAddr;

use tracing::{debug, warn};

use crate::protocol::codec::{encode_common_answer, encode_frame};
use crate::protocol::types::{CommonAnswerCode, PacketType};
use crate::protocol::validator::Rejection;
use crate::transport::DatagramTransport;

/// One outbound reply, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    CommonAnswer {
        packet_type: PacketType,
        code: CommonAnswerCode,
    },
    Typed {
        packet_type: PacketType,
        payload: Vec<u8>,
    },
}

impl Reply {
    pub fn answer(packet_type: PacketType, code: CommonAnswerCode) -> Self {
        Reply::CommonAnswer { packet_type, code }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Reply::CommonAnswer { packet_type, code } => {
                encode_common_answer(*packet_type, *code, &[])
            }
            Reply::Typed {
                packet_type,
                payload,
            } => encode_frame(*packet_type, payload),
        }
    }
}

impl From<&Rejection> for Reply {
    fn from(rejection: &Rejection) -> Self {
        Reply::answer(rejection.reply_type, rejection.code())
    }
}

/// Destination of replies. Delivery is fire-and-forget: implementations
/// report failures through logs, never to the caller.
pub trait ReplySink {
    fn send(&mut self, reply: Reply);
}

impl ReplySink for Vec<Reply> {
    fn send(&mut self, reply: Reply) {
        self.push(reply);
    }
}

/// Sends replies to the broadcast address through the device transport.
pub struct ResponseEmitter<T: DatagramTransport> {
    transport: T,
    destination: SocketAddr,
    last_sent: Option<Vec<u8>>,
    sent: u64,
    failed: u64,
}

impl<T: DatagramTransport> ResponseEmitter<T> {
    pub fn new(transport: T, destination: SocketAddr) -> Self {
        Self {
            transport,
            destination,
            last_sent: None,
            sent: 0,
            failed: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Whether `datagram` is our own last reply coming back through the
    /// broadcast domain.
    pub fn is_echo(&self, datagram: &[u8]) -> bool {
        self.last_sent.as_deref() == Some(datagram)
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl<T: DatagramTransport> ReplySink for ResponseEmitter<T> {
    fn send(&mut self, reply: Reply) {
        let frame = reply.encode();
        match self.transport.send_to(&frame, self.destination) {
            Ok(()) => {
                self.sent += 1;
                debug!(?reply, dest = %self.destination, len = frame.len(), "reply sent");
            }
            Err(err) => {
                self.failed += 1;
                warn!(?reply, dest = %self.destination, error = %err, "reply not sent");
            }
        }
        self.last_sent = Some(frame);
    }
}
