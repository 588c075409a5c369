use super::error::FrameError;
use super::layout;

/// Bounds-checked access to a received datagram.
pub struct FrameReader<'a> {
    bytes: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), FrameError> {
        if self.bytes.len() < needed {
            return Err(FrameError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, FrameError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(FrameError::TooShort {
                needed: offset + 1,
                actual: self.bytes.len(),
            })
    }

    pub fn read_u16_le(&self, range: std::ops::Range<usize>) -> Result<u16, FrameError> {
        let bytes = self.read_slice(range)?;
        match bytes {
            [lo, hi] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(FrameError::TooShort {
                needed: 2,
                actual: bytes.len(),
            }),
        }
    }

    pub fn read_u32_le(&self, range: std::ops::Range<usize>) -> Result<u32, FrameError> {
        let bytes = self.read_slice(range)?;
        match bytes {
            [b0, b1, b2, b3] => Ok(u32::from_le_bytes([*b0, *b1, *b2, *b3])),
            _ => Err(FrameError::TooShort {
                needed: 4,
                actual: bytes.len(),
            }),
        }
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], FrameError> {
        self.bytes.get(range.clone()).ok_or(FrameError::TooShort {
            needed: range.end,
            actual: self.bytes.len(),
        })
    }

    pub fn read_magic(&self) -> Result<&'a [u8], FrameError> {
        self.read_slice(layout::MAGIC_RANGE)
    }

    /// Last byte of the frame.
    pub fn read_trailer(&self) -> Result<u8, FrameError> {
        self.require_len(1)?;
        self.read_u8(self.bytes.len() - 1)
    }

    /// Bytes between `start` and the trailing checksum byte.
    pub fn read_until_trailer(&self, start: usize) -> Result<&'a [u8], FrameError> {
        let needed = start + layout::CHECKSUM_LEN;
        self.require_len(needed)?;
        self.read_slice(start..self.bytes.len() - layout::CHECKSUM_LEN)
    }
}
