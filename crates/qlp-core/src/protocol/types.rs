use serde::Serialize;

use super::error::FrameError;

/// Packet type tag carried in byte 4 of every frame.
///
/// `None` never arrives as a valid inbound type; it tags replies to
/// datagrams rejected before their type was known.
///
/// # Examples
/// ```
/// use qlp_core::PacketType;
///
/// assert_eq!(PacketType::try_from(3).unwrap(), PacketType::Control);
/// assert!(PacketType::try_from(4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketType {
    None = 0,
    Discovery = 1,
    Broadcast = 2,
    Control = 3,
}

impl PacketType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::None),
            1 => Ok(PacketType::Discovery),
            2 => Ok(PacketType::Broadcast),
            3 => Ok(PacketType::Control),
            value => Err(FrameError::UnknownPacketType { value }),
        }
    }
}

/// Status code carried by a common answer.
///
/// `0x03` is reserved for an encryption error that the protocol does not
/// define yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommonAnswerCode {
    Ok = 0x00,
    VersionError = 0x01,
    CrcError = 0x02,
    LengthError = 0x04,
    InvalidHeaderError = 0x05,
    InvalidPacketType = 0x06,
    OtherError = 0xFF,
}

impl CommonAnswerCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommonAnswerCode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CommonAnswerCode::Ok),
            0x01 => Ok(CommonAnswerCode::VersionError),
            0x02 => Ok(CommonAnswerCode::CrcError),
            0x04 => Ok(CommonAnswerCode::LengthError),
            0x05 => Ok(CommonAnswerCode::InvalidHeaderError),
            0x06 => Ok(CommonAnswerCode::InvalidPacketType),
            0xFF => Ok(CommonAnswerCode::OtherError),
            value => Err(FrameError::UnknownAnswerCode { value }),
        }
    }
}

/// Fixed five-byte header, as found on the wire. Nothing is judged here:
/// the validator decides whether magic, version and type are acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: [u8; 3],
    pub version: u8,
    pub type_byte: u8,
}

/// 24-bit color, transmitted as R, G, B.
///
/// # Examples
/// ```
/// use qlp_core::Rgb;
///
/// let color = Rgb::from_u32(0xFF0080);
/// assert_eq!(color, Rgb::new(0xFF, 0x00, 0x80));
/// assert_eq!(color.to_u32(), 0xFF0080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_u32(value: u32) -> Self {
        Self {
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }

    pub const fn to_u32(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Owned typed frame, as returned by client-side decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub packet_type: PacketType,
    pub payload: Vec<u8>,
}

/// Decoded common answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonAnswer {
    pub packet_type: PacketType,
    pub code: CommonAnswerCode,
    pub data: Vec<u8>,
}
