use thiserror::Error;

use super::types::CommonAnswerCode;

/// Errors returned by frame decoding.
///
/// # Examples
/// ```
/// use qlp_core::{CommonAnswerCode, FrameError};
///
/// let err = FrameError::UnsupportedVersion { version: 7 };
/// assert!(err.to_string().contains("unsupported protocol version"));
/// assert_eq!(err.answer_code(), CommonAnswerCode::VersionError);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("invalid frame magic")]
    InvalidMagic,
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion { version: u8 },
    #[error("unknown packet type: {value}")]
    UnknownPacketType { value: u8 },
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },
    #[error("unknown common answer code: {value:#04x}")]
    UnknownAnswerCode { value: u8 },
}

impl FrameError {
    /// Common-answer code reported to the sender for this error.
    pub fn answer_code(&self) -> CommonAnswerCode {
        match self {
            FrameError::TooShort { .. } => CommonAnswerCode::LengthError,
            FrameError::InvalidMagic => CommonAnswerCode::InvalidHeaderError,
            FrameError::UnsupportedVersion { .. } => CommonAnswerCode::VersionError,
            FrameError::UnknownPacketType { .. } => CommonAnswerCode::InvalidPacketType,
            FrameError::ChecksumMismatch { .. } => CommonAnswerCode::CrcError,
            FrameError::UnknownAnswerCode { .. } => CommonAnswerCode::OtherError,
        }
    }
}

/// Errors returned when interpreting a CONTROL payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("control frame too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("command {command_id:#04x} expects {expected} data bytes, got {actual}")]
    LengthMismatch {
        command_id: u8,
        expected: usize,
        actual: usize,
    },
    #[error("packet is not a CONTROL packet")]
    NotControl,
}

impl From<FrameError> for CommandError {
    fn from(value: FrameError) -> Self {
        match value {
            FrameError::TooShort { needed, actual } => CommandError::TooShort { needed, actual },
            _ => CommandError::NotControl,
        }
    }
}
