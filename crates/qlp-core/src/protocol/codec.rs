//! Frame encoding and decoding.
//!
//! Three checksum seeds coexist on the wire: inbound frames are validated
//! with `0x75` folded over everything before the trailer, typed replies are
//! sealed with `0x39` folded over type and payload, and common answers with
//! `0xA9` folded over type and extra data. Since `0x75 ^ b'Q' ^ b'L' ^ b'P' ^ 1`
//! equals `0x39`, typed frames produced here pass inbound validation;
//! common answers do not and are decoded with their own seed.

use super::error::FrameError;
use super::layout;
use super::reader::FrameReader;
use super::types::{CommonAnswer, CommonAnswerCode, Frame, PacketHeader, PacketType};
use super::validator::check_frame;

fn fold(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, byte| acc ^ byte)
}

/// Inbound checksum: XOR of every byte except the last, seeded with `0x75`.
///
/// # Examples
/// ```
/// use qlp_core::checksum;
///
/// assert_eq!(checksum(&[]), 0x75);
/// assert_eq!(checksum(&[0x01, 0xAA]), 0x75 ^ 0x01);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    let body = bytes.split_last().map(|(_, body)| body).unwrap_or(&[]);
    fold(layout::INBOUND_SEED, body)
}

fn write_header(out: &mut Vec<u8>, packet_type: PacketType) {
    out.extend_from_slice(layout::MAGIC);
    out.push(layout::PROTOCOL_VERSION);
    out.push(packet_type.as_u8());
}

/// Encode a typed frame: header, payload, checksum seeded with `0x39`.
///
/// # Examples
/// ```
/// use qlp_core::{PacketType, decode_frame, encode_frame};
///
/// let frame = encode_frame(PacketType::Discovery, b"ABH");
/// assert_eq!(&frame[..5], b"QLP\x01\x01");
/// let decoded = decode_frame(&frame).unwrap();
/// assert_eq!(decoded.payload, b"ABH");
/// ```
pub fn encode_frame(packet_type: PacketType, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(layout::MIN_FRAME_LEN + payload.len());
    write_header(&mut out, packet_type);
    out.extend_from_slice(payload);
    let crc = fold(layout::FRAME_SEED ^ packet_type.as_u8(), payload);
    out.push(crc);
    out
}

/// Encode a common answer: header, code, extra data, checksum seeded with
/// `0xA9`. The code byte is not part of the checksum.
pub fn encode_common_answer(packet_type: PacketType, code: CommonAnswerCode, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(layout::ANSWER_MIN_LEN + data.len());
    write_header(&mut out, packet_type);
    out.push(code.as_u8());
    out.extend_from_slice(data);
    let crc = fold(layout::ANSWER_SEED ^ packet_type.as_u8(), data);
    out.push(crc);
    out
}

/// Read the fixed header without judging its contents.
pub fn decode_header(bytes: &[u8]) -> Result<PacketHeader, FrameError> {
    let reader = FrameReader::new(bytes);
    reader.require_len(layout::HEADER_LEN)?;
    let magic = reader.read_magic()?;
    Ok(PacketHeader {
        magic: [magic[0], magic[1], magic[2]],
        version: reader.read_u8(layout::VERSION_OFFSET)?,
        type_byte: reader.read_u8(layout::TYPE_OFFSET)?,
    })
}

/// Decode a typed frame, applying the same checks as the device validator.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let packet = check_frame(bytes).map_err(|rejection| rejection.error)?;
    Ok(Frame {
        packet_type: packet.packet_type(),
        payload: packet.payload().to_vec(),
    })
}

/// Decode a common answer frame sealed with the `0xA9` seed.
pub fn decode_common_answer(bytes: &[u8]) -> Result<CommonAnswer, FrameError> {
    let reader = FrameReader::new(bytes);
    reader.require_len(layout::ANSWER_MIN_LEN)?;
    let header = decode_header(bytes)?;
    if &header.magic != layout::MAGIC {
        return Err(FrameError::InvalidMagic);
    }
    if header.version != layout::PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion {
            version: header.version,
        });
    }
    let packet_type = PacketType::try_from(header.type_byte)?;
    let code = CommonAnswerCode::try_from(reader.read_u8(layout::ANSWER_CODE_OFFSET)?)?;
    let data = reader.read_until_trailer(layout::ANSWER_CODE_OFFSET + 1)?;
    let expected = fold(layout::ANSWER_SEED ^ header.type_byte, data);
    let actual = reader.read_trailer()?;
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }
    Ok(CommonAnswer {
        packet_type,
        code,
        data: data.to_vec(),
    })
}
