//! CONTROL payloads: request envelope and the command table.

use serde::Serialize;

use super::codec::encode_frame;
use super::error::CommandError;
use super::layout;
use super::reader::FrameReader;
use super::types::{PacketType, Rgb};
use super::validator::Packet;

pub const CMD_SET_LENGTH: u8 = 0x01;
pub const CMD_SET_PIXEL: u8 = 0x51;
pub const CMD_SET_LINE: u8 = 0x52;
pub const CMD_FILL: u8 = 0x54;
pub const CMD_REBOOT: u8 = 0x74;

const SET_LENGTH_LEN: usize = 1;
const FILL_LEN: usize = layout::COLOR_LEN;
const SET_PIXEL_LEN: usize = layout::INDEX_LEN + layout::COLOR_LEN;
const SET_LINE_LEN: usize = 2 * layout::INDEX_LEN + layout::COLOR_LEN;

/// A device command with its arguments decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Acknowledge, blank the strip and restart the device.
    Reboot,
    /// Resize the strip. One byte on the wire, so at most 255 pixels.
    SetLength { length: u8 },
    Fill { color: Rgb },
    SetPixel { index: u16, color: Rgb },
    /// Paint the half-open range `[start, end)`.
    SetLine { start: u16, end: u16, color: Rgb },
}

impl ControlCommand {
    /// Decode `data` for `command_id`.
    ///
    /// Returns `Ok(None)` for command ids the device does not implement.
    ///
    /// # Examples
    /// ```
    /// use qlp_core::{CommandError, ControlCommand, Rgb};
    ///
    /// let fill = ControlCommand::parse(0x54, &[0xFF, 0x00, 0x80]).unwrap();
    /// assert_eq!(fill, Some(ControlCommand::Fill { color: Rgb::from_u32(0xFF0080) }));
    ///
    /// assert!(matches!(
    ///     ControlCommand::parse(0x54, &[0xFF, 0x00]),
    ///     Err(CommandError::LengthMismatch { expected: 3, actual: 2, .. })
    /// ));
    /// assert_eq!(ControlCommand::parse(0x31, &[]).unwrap(), None);
    /// ```
    pub fn parse(command_id: u8, data: &[u8]) -> Result<Option<Self>, CommandError> {
        let reader = FrameReader::new(data);
        let command = match command_id {
            CMD_REBOOT => ControlCommand::Reboot,
            CMD_SET_LENGTH => {
                require_exact(command_id, data, SET_LENGTH_LEN)?;
                ControlCommand::SetLength {
                    length: reader.read_u8(0)?,
                }
            }
            CMD_FILL => {
                require_exact(command_id, data, FILL_LEN)?;
                ControlCommand::Fill {
                    color: read_color(&reader, 0)?,
                }
            }
            CMD_SET_PIXEL => {
                require_exact(command_id, data, SET_PIXEL_LEN)?;
                ControlCommand::SetPixel {
                    index: reader.read_u16_le(0..layout::INDEX_LEN)?,
                    color: read_color(&reader, layout::INDEX_LEN)?,
                }
            }
            CMD_SET_LINE => {
                require_exact(command_id, data, SET_LINE_LEN)?;
                ControlCommand::SetLine {
                    start: reader.read_u16_le(0..layout::INDEX_LEN)?,
                    end: reader.read_u16_le(layout::INDEX_LEN..2 * layout::INDEX_LEN)?,
                    color: read_color(&reader, 2 * layout::INDEX_LEN)?,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    pub fn command_id(&self) -> u8 {
        match self {
            ControlCommand::Reboot => CMD_REBOOT,
            ControlCommand::SetLength { .. } => CMD_SET_LENGTH,
            ControlCommand::Fill { .. } => CMD_FILL,
            ControlCommand::SetPixel { .. } => CMD_SET_PIXEL,
            ControlCommand::SetLine { .. } => CMD_SET_LINE,
        }
    }

    /// Command data as sent on the wire, without the command id.
    pub fn encode_data(&self) -> Vec<u8> {
        match *self {
            ControlCommand::Reboot => Vec::new(),
            ControlCommand::SetLength { length } => vec![length],
            ControlCommand::Fill { color } => color.to_bytes().to_vec(),
            ControlCommand::SetPixel { index, color } => {
                let mut out = Vec::with_capacity(SET_PIXEL_LEN);
                out.extend_from_slice(&index.to_le_bytes());
                out.extend_from_slice(&color.to_bytes());
                out
            }
            ControlCommand::SetLine { start, end, color } => {
                let mut out = Vec::with_capacity(SET_LINE_LEN);
                out.extend_from_slice(&start.to_le_bytes());
                out.extend_from_slice(&end.to_le_bytes());
                out.extend_from_slice(&color.to_bytes());
                out
            }
        }
    }
}

fn require_exact(command_id: u8, data: &[u8], expected: usize) -> Result<(), CommandError> {
    if data.len() != expected {
        return Err(CommandError::LengthMismatch {
            command_id,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn read_color(reader: &FrameReader<'_>, offset: usize) -> Result<Rgb, CommandError> {
    let bytes = reader.read_slice(offset..offset + layout::COLOR_LEN)?;
    match bytes {
        [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
        _ => Err(CommandError::TooShort {
            needed: offset + layout::COLOR_LEN,
            actual: offset + bytes.len(),
        }),
    }
}

/// Envelope of a CONTROL frame: addressee, command id and raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest<'a> {
    pub device_id: u32,
    pub command_id: u8,
    pub data: &'a [u8],
}

impl<'a> ControlRequest<'a> {
    /// Read only the addressee. Needs the id bytes but not the command id,
    /// so frames for other devices can be dropped before any length check.
    pub fn device_id(packet: &Packet<'a>) -> Result<u32, CommandError> {
        if packet.packet_type() != PacketType::Control {
            return Err(CommandError::NotControl);
        }
        let reader = FrameReader::new(packet.frame());
        reader.require_len(layout::CONTROL_ADDRESSED_LEN)?;
        Ok(reader.read_u32_le(layout::DEVICE_ID_RANGE)?)
    }

    pub fn parse(packet: &Packet<'a>) -> Result<Self, CommandError> {
        if packet.packet_type() != PacketType::Control {
            return Err(CommandError::NotControl);
        }
        let reader = FrameReader::new(packet.frame());
        reader.require_len(layout::CONTROL_MIN_LEN)?;
        Ok(Self {
            device_id: reader.read_u32_le(layout::DEVICE_ID_RANGE)?,
            command_id: reader.read_u8(layout::COMMAND_ID_OFFSET)?,
            data: reader.read_until_trailer(layout::CONTROL_DATA_OFFSET)?,
        })
    }
}

/// Build a complete CONTROL frame addressed to `device_id`.
///
/// # Examples
/// ```
/// use qlp_core::{ControlCommand, encode_control};
///
/// let frame = encode_control(0x00C0FFEE, &ControlCommand::SetLength { length: 30 });
/// assert_eq!(&frame[5..9], &0x00C0FFEEu32.to_le_bytes());
/// assert_eq!(frame[9], 0x01);
/// assert_eq!(frame[10], 30);
/// ```
pub fn encode_control(device_id: u32, command: &ControlCommand) -> Vec<u8> {
    encode_raw_control(device_id, command.command_id(), &command.encode_data())
}

/// Build a CONTROL frame from raw parts, including ids the device ignores.
pub fn encode_raw_control(device_id: u32, command_id: u8, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(layout::DEVICE_ID_RANGE.len() + 1 + data.len());
    payload.extend_from_slice(&device_id.to_le_bytes());
    payload.push(command_id);
    payload.extend_from_slice(data);
    encode_frame(PacketType::Control, &payload)
}
