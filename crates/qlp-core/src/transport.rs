//! Datagram transport capability.
//!
//! The device polls: `poll_recv` never blocks and reports `None` when no
//! datagram is pending. A datagram that arrives while another is being
//! handled waits in the socket's receive buffer until the next poll.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("socket configuration failed: {0}")]
    Configure(std::io::Error),
    #[error("receive failed: {0}")]
    Recv(std::io::Error),
    #[error("send to {dest} failed: {source}")]
    Send {
        dest: SocketAddr,
        source: std::io::Error,
    },
}

pub trait DatagramTransport {
    /// Receive one pending datagram into `buf`, truncating it to `buf.len()`.
    fn poll_recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError>;

    fn send_to(&mut self, frame: &[u8], dest: SocketAddr) -> Result<(), TransportError>;

    /// Whether `addr` is this transport's own endpoint, i.e. a datagram from
    /// it is our broadcast coming back.
    fn is_local(&self, addr: SocketAddr) -> bool;
}

/// Non-blocking UDP socket with broadcast enabled.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket =
            UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        socket
            .set_nonblocking(true)
            .map_err(TransportError::Configure)?;
        socket
            .set_broadcast(true)
            .map_err(TransportError::Configure)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket.local_addr().map_err(TransportError::Configure)
    }
}

impl DatagramTransport for UdpTransport {
    fn poll_recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from))),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            // Windows reports ICMP port-unreachable for earlier sends here.
            Err(err) if err.kind() == ErrorKind::ConnectionReset => Ok(None),
            Err(err) => Err(TransportError::Recv(err)),
        }
    }

    fn send_to(&mut self, frame: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .send_to(frame, dest)
            .map(|_| ())
            .map_err(|source| TransportError::Send { dest, source })
    }

    fn is_local(&self, addr: SocketAddr) -> bool {
        let Ok(local) = self.socket.local_addr() else {
            return false;
        };
        if addr.port() != local.port() {
            return false;
        }
        if addr.ip() == local.ip() || addr.ip().is_loopback() {
            return true;
        }
        // Binding only succeeds for an address assigned to this host.
        UdpSocket::bind(SocketAddr::new(addr.ip(), 0)).is_ok()
    }
}

/// In-memory transport: a queue of inbound datagrams and a log of sends.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    inbound: VecDeque<(Vec<u8>, SocketAddr)>,
    sent: Vec<(Vec<u8>, SocketAddr)>,
    fail_sends: bool,
    local: Option<SocketAddr>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address reported as this transport's own endpoint.
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local = Some(addr);
        self
    }

    pub fn push_inbound(&mut self, datagram: impl Into<Vec<u8>>, from: SocketAddr) {
        self.inbound.push_back((datagram.into(), from));
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    pub fn sent(&self) -> &[(Vec<u8>, SocketAddr)] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<(Vec<u8>, SocketAddr)> {
        std::mem::take(&mut self.sent)
    }

    /// Make every following send fail, as an unreachable network would.
    pub fn fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }
}

impl DatagramTransport for LoopbackTransport {
    fn poll_recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>, TransportError> {
        let Some((datagram, from)) = self.inbound.pop_front() else {
            return Ok(None);
        };
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some((len, from)))
    }

    fn send_to(&mut self, frame: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        if self.fail_sends {
            return Err(TransportError::Send {
                dest,
                source: std::io::Error::new(ErrorKind::NetworkUnreachable, "loopback send disabled"),
            });
        }
        self.sent.push((frame.to_vec(), dest));
        Ok(())
    }

    fn is_local(&self, addr: SocketAddr) -> bool {
        self.local == Some(addr)
    }
}
