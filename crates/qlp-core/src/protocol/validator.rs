//! Inbound frame validation.
//!
//! Checks run in a fixed order and the first failure decides the single
//! reported reason: length, magic, version, type range, checksum. Only the
//! checksum failure knows the packet type, so only it replies with a typed
//! common answer; every earlier failure replies with `NONE`.

use super::codec::checksum;
use super::error::FrameError;
use super::layout;
use super::reader::FrameReader;
use super::types::{CommonAnswerCode, PacketType};

/// A datagram that passed every structural check. Borrows the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    packet_type: PacketType,
    frame: &'a [u8],
}

impl<'a> Packet<'a> {
    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The whole frame, header and checksum included.
    pub fn frame(&self) -> &'a [u8] {
        self.frame
    }

    /// Bytes between the header and the checksum.
    pub fn payload(&self) -> &'a [u8] {
        &self.frame[layout::HEADER_LEN..self.frame.len() - layout::CHECKSUM_LEN]
    }
}

/// Why a datagram was refused, and how to tag the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reply_type: PacketType,
    pub error: FrameError,
}

impl Rejection {
    fn untyped(error: FrameError) -> Self {
        Self {
            reply_type: PacketType::None,
            error,
        }
    }

    pub fn code(&self) -> CommonAnswerCode {
        self.error.answer_code()
    }
}

/// Outcome of validating one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<'a> {
    Valid(Packet<'a>),
    Rejected(Rejection),
}

/// Validate one datagram.
///
/// # Examples
/// ```
/// use qlp_core::{CommonAnswerCode, PacketType, Verdict, encode_frame, validate};
///
/// let frame = encode_frame(PacketType::Discovery, b"ABH");
/// assert!(matches!(validate(&frame), Verdict::Valid(_)));
///
/// match validate(b"QLP") {
///     Verdict::Rejected(rejection) => {
///         assert_eq!(rejection.reply_type, PacketType::None);
///         assert_eq!(rejection.code(), CommonAnswerCode::LengthError);
///     }
///     Verdict::Valid(_) => unreachable!(),
/// }
/// ```
pub fn validate(datagram: &[u8]) -> Verdict<'_> {
    match check_frame(datagram) {
        Ok(packet) => Verdict::Valid(packet),
        Err(rejection) => Verdict::Rejected(rejection),
    }
}

pub(crate) fn check_frame(datagram: &[u8]) -> Result<Packet<'_>, Rejection> {
    let reader = FrameReader::new(datagram);
    reader
        .require_len(layout::MIN_FRAME_LEN)
        .map_err(Rejection::untyped)?;

    let magic = reader.read_magic().map_err(Rejection::untyped)?;
    if magic != layout::MAGIC {
        return Err(Rejection::untyped(FrameError::InvalidMagic));
    }

    let version = reader
        .read_u8(layout::VERSION_OFFSET)
        .map_err(Rejection::untyped)?;
    if version != layout::PROTOCOL_VERSION {
        return Err(Rejection::untyped(FrameError::UnsupportedVersion {
            version,
        }));
    }

    let type_byte = reader
        .read_u8(layout::TYPE_OFFSET)
        .map_err(Rejection::untyped)?;
    if type_byte > layout::MAX_PACKET_TYPE {
        return Err(Rejection::untyped(FrameError::UnknownPacketType {
            value: type_byte,
        }));
    }
    let packet_type = PacketType::try_from(type_byte).map_err(Rejection::untyped)?;

    let expected = checksum(datagram);
    let actual = reader.read_trailer().map_err(Rejection::untyped)?;
    if expected != actual {
        return Err(Rejection {
            reply_type: packet_type,
            error: FrameError::ChecksumMismatch { expected, actual },
        });
    }

    Ok(Packet {
        packet_type,
        frame: datagram,
    })
}
