//! Byte layout of QLP frames. Offsets are relative to the start of the frame.

pub const MAGIC: &[u8; 3] = b"QLP";
pub const PROTOCOL_VERSION: u8 = 1;

pub const MAGIC_RANGE: std::ops::Range<usize> = 0..3;
pub const VERSION_OFFSET: usize = 3;
pub const TYPE_OFFSET: usize = 4;
pub const HEADER_LEN: usize = 5;
pub const CHECKSUM_LEN: usize = 1;

/// Magic, version, type and checksum.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CHECKSUM_LEN;
/// Largest datagram the receive path keeps; longer datagrams are truncated.
pub const MAX_DATAGRAM_LEN: usize = 8192;

pub const MAX_PACKET_TYPE: u8 = 3;

pub const DEVICE_ID_RANGE: std::ops::Range<usize> = 5..9;
pub const COMMAND_ID_OFFSET: usize = 9;
pub const CONTROL_DATA_OFFSET: usize = 10;
/// Shortest CONTROL frame that carries a complete device id.
pub const CONTROL_ADDRESSED_LEN: usize = COMMAND_ID_OFFSET + CHECKSUM_LEN;
pub const CONTROL_MIN_LEN: usize = CONTROL_DATA_OFFSET + CHECKSUM_LEN;

pub const ANSWER_CODE_OFFSET: usize = 5;
pub const ANSWER_MIN_LEN: usize = ANSWER_CODE_OFFSET + 1 + CHECKSUM_LEN;

pub const DISCOVERY_REQUEST: &[u8; 3] = b"ABH";
pub const DISCOVERY_REPLY_PREFIX: &str = "IAH";

/// Seed of the inbound checksum, folded over every byte but the last.
pub const INBOUND_SEED: u8 = 0x75;
/// Seed of outbound typed frames, folded over the type and payload bytes.
pub const FRAME_SEED: u8 = 0x39;
/// Seed of outbound common-answer frames, folded over the type and extra data bytes.
pub const ANSWER_SEED: u8 = 0xA9;

/// Well-known UDP port of the service.
pub const SERVICE_PORT: u16 = 52075;

pub const COLOR_LEN: usize = 3;
pub const INDEX_LEN: usize = 2;
