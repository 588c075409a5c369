//! Single-threaded device loop: poll, validate, dispatch, reply.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, info};

use crate::device::dispatch::{DispatchOutcome, dispatch};
use crate::device::emitter::{Reply, ReplySink, ResponseEmitter};
use crate::device::state::DeviceState;
use crate::device::strip::LedStrip;
use crate::protocol::layout;
use crate::protocol::types::CommonAnswerCode;
use crate::protocol::validator::{Verdict, validate};
use crate::transport::{DatagramTransport, TransportError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Device restart capability, invoked once after a reboot command.
pub trait ResetHandle {
    fn reset(&mut self);
}

impl<F: FnMut()> ResetHandle for F {
    fn reset(&mut self) {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No datagram was pending.
    Idle,
    /// The datagram was our own last reply and was dropped.
    Echo,
    /// The validator refused the datagram and a common answer was sent.
    Rejected(CommonAnswerCode),
    Dispatched(DispatchOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceExit {
    /// A reboot command was handled and the reset handle invoked.
    Reset,
    /// The shutdown flag was raised.
    Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub received: u64,
    pub rejected: u64,
    pub dispatched: u64,
    pub echoes: u64,
}

pub struct DeviceService<T, S, R, X>
where
    T: DatagramTransport,
    S: LedStrip,
    R: RngCore,
    X: ResetHandle,
{
    emitter: ResponseEmitter<T>,
    state: DeviceState<S>,
    rng: R,
    reset: X,
    buf: Vec<u8>,
    stats: ServiceStats,
}

impl<T, S, R, X> DeviceService<T, S, R, X>
where
    T: DatagramTransport,
    S: LedStrip,
    R: RngCore,
    X: ResetHandle,
{
    /// `reply_to` is the broadcast address and service port replies go to.
    pub fn new(transport: T, reply_to: SocketAddr, state: DeviceState<S>, rng: R, reset: X) -> Self {
        Self {
            emitter: ResponseEmitter::new(transport, reply_to),
            state,
            rng,
            reset,
            buf: vec![0u8; layout::MAX_DATAGRAM_LEN],
            stats: ServiceStats::default(),
        }
    }

    pub fn state(&self) -> &DeviceState<S> {
        &self.state
    }

    pub fn transport(&self) -> &T {
        self.emitter.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.emitter.transport_mut()
    }

    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    /// Handle at most one pending datagram, to completion.
    pub fn poll_once(&mut self) -> Result<PollOutcome, ServiceError> {
        let Some((len, from)) = self.emitter.transport_mut().poll_recv(&mut self.buf)? else {
            return Ok(PollOutcome::Idle);
        };
        self.stats.received += 1;
        let datagram = &self.buf[..len];

        if self.emitter.is_echo(datagram) && self.emitter.transport().is_local(from) {
            self.stats.echoes += 1;
            debug!(%from, len, "dropping own reply");
            return Ok(PollOutcome::Echo);
        }

        debug!(%from, len, "datagram received");
        let packet = match validate(datagram) {
            Verdict::Valid(packet) => packet,
            Verdict::Rejected(rejection) => {
                self.stats.rejected += 1;
                debug!(%from, error = %rejection.error, "datagram rejected");
                let code = rejection.code();
                self.emitter.send(Reply::from(&rejection));
                return Ok(PollOutcome::Rejected(code));
            }
        };

        self.stats.dispatched += 1;
        let outcome = dispatch(&mut self.state, &packet, &mut self.rng, &mut self.emitter);
        if outcome == DispatchOutcome::ResetRequested {
            info!(%from, "restarting device");
            self.reset.reset();
        }
        Ok(PollOutcome::Dispatched(outcome))
    }

    /// Poll until a reboot command arrives or `shutdown` is raised, sleeping
    /// `poll_interval` whenever nothing is pending.
    pub fn run(
        &mut self,
        poll_interval: Duration,
        shutdown: &AtomicBool,
    ) -> Result<ServiceExit, ServiceError> {
        info!(
            device_id = %format!("{:08X}", self.state.identity.device_id),
            name = %self.state.identity.name,
            reply_to = %self.emitter.destination(),
            "device service started"
        );
        while !shutdown.load(Ordering::Relaxed) {
            match self.poll_once()? {
                PollOutcome::Idle => std::thread::sleep(poll_interval),
                PollOutcome::Dispatched(DispatchOutcome::ResetRequested) => {
                    return Ok(ServiceExit::Reset);
                }
                _ => {}
            }
        }
        info!(stats = ?self.stats, "device service stopped");
        Ok(ServiceExit::Shutdown)
    }
}
