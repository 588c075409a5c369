//! QLP core library: the LED device control plane and its controller side.
//!
//! A device listens for QLP datagrams on UDP port 52075, validates each one,
//! acts on it and broadcasts exactly one reply or stays silent. The crate is
//! layered the same way on both sides of the wire: protocol decoders
//! (layout/reader/codec) know nothing about sockets, the device layer mutates
//! state through the `LedStrip` capability, and all I/O goes through the
//! `DatagramTransport` capability so every path runs in tests without a
//! network.
//!
//! Invariants:
//! - At most one reply per inbound datagram.
//! - Validation reports the first failing check only, in a fixed order.
//! - CONTROL frames addressed to another device never produce a reply.
//!
//! Version française (résumé):
//! Cette crate implémente le plan de contrôle QLP : validation des trames,
//! interprétation des commandes, réponses diffusées en broadcast. Les E/S
//! passent par `DatagramTransport`, la bande LED par `LedStrip`.
//!
//! # Examples
//! ```
//! use std::net::SocketAddr;
//!
//! use qlp_core::{
//!     CommonAnswerCode, ControlCommand, DeviceIdentity, DeviceService, DeviceState,
//!     LoopbackTransport, MemoryStrip, Rgb, decode_common_answer, encode_control,
//! };
//! use rand::rngs::mock::StepRng;
//!
//! let broadcast: SocketAddr = "255.255.255.255:52075".parse().unwrap();
//! let state = DeviceState::new(DeviceIdentity::new(0x2A, "Desk"), MemoryStrip::new(4));
//! let mut service = DeviceService::new(
//!     LoopbackTransport::new(),
//!     broadcast,
//!     state,
//!     StepRng::new(0, 1),
//!     || {},
//! );
//!
//! let fill = ControlCommand::Fill { color: Rgb::new(255, 0, 0) };
//! let controller: SocketAddr = "10.0.0.2:52075".parse().unwrap();
//! service.transport_mut().push_inbound(encode_control(0x2A, &fill), controller);
//! service.poll_once()?;
//!
//! let (reply, _) = &service.transport().sent()[0];
//! assert_eq!(decode_common_answer(reply)?.code, CommonAnswerCode::Ok);
//! assert_eq!(service.state().strip.shown(), &[Rgb::new(255, 0, 0); 4]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod client;
pub mod config;
pub mod device;
pub mod protocol;
pub mod service;
pub mod transport;

pub use client::{ClientError, Controller, DiscoveredDevice, DiscoveryError, parse_discovery_reply};
pub use config::{Config, ConfigError, LogFormat};
pub use device::dispatch::{DispatchOutcome, LENGTH_MARKER, dispatch};
pub use device::emitter::{Reply, ReplySink, ResponseEmitter};
pub use device::state::{DEFAULT_DEVICE_NAME, DeviceIdentity, DeviceState};
pub use device::strip::{LedStrip, MemoryStrip};
pub use protocol::codec::{
    checksum, decode_common_answer, decode_frame, decode_header, encode_common_answer,
    encode_frame,
};
pub use protocol::command::{ControlCommand, ControlRequest, encode_control, encode_raw_control};
pub use protocol::error::{CommandError, FrameError};
pub use protocol::layout::{MAX_DATAGRAM_LEN, PROTOCOL_VERSION, SERVICE_PORT};
pub use protocol::types::{CommonAnswer, CommonAnswerCode, Frame, PacketHeader, PacketType, Rgb};
pub use protocol::validator::{Packet, Rejection, Verdict, validate};
pub use service::{DeviceService, PollOutcome, ResetHandle, ServiceError, ServiceExit, ServiceStats};
pub use transport::{DatagramTransport, LoopbackTransport, TransportError, UdpTransport};
