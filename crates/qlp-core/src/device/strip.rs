use tracing::debug;

use crate::protocol::types::Rgb;

/// Addressable LED strip driver.
///
/// Writes land in a pixel buffer and become visible on `flush`. Writes at or
/// beyond `len()` are ignored.
pub trait LedStrip {
    fn len(&self) -> u16;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize the pixel buffer. Pixel contents after resizing are unspecified
    /// until the next `clear` or `fill`.
    fn set_len(&mut self, len: u16);

    fn clear(&mut self) {
        self.fill(Rgb::BLACK);
    }

    fn set_pixel(&mut self, index: u16, color: Rgb);

    fn fill(&mut self, color: Rgb);

    fn flush(&mut self);
}

/// In-memory strip: keeps the pending buffer, the last flushed frame and
/// write counters.
#[derive(Debug, Clone, Default)]
pub struct MemoryStrip {
    pixels: Vec<Rgb>,
    shown: Vec<Rgb>,
    flushes: u64,
    pixel_writes: u64,
}

impl MemoryStrip {
    pub fn new(len: u16) -> Self {
        Self {
            pixels: vec![Rgb::BLACK; len as usize],
            ..Self::default()
        }
    }

    /// Pending buffer, including writes not flushed yet.
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Frame made visible by the last flush.
    pub fn shown(&self) -> &[Rgb] {
        &self.shown
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Number of `set_pixel` calls that landed inside the strip.
    pub fn pixel_writes(&self) -> u64 {
        self.pixel_writes
    }

    pub fn lit(&self) -> usize {
        self.shown.iter().filter(|pixel| **pixel != Rgb::BLACK).count()
    }
}

impl LedStrip for MemoryStrip {
    fn len(&self) -> u16 {
        self.pixels.len() as u16
    }

    fn set_len(&mut self, len: u16) {
        self.pixels.resize(len as usize, Rgb::BLACK);
    }

    fn set_pixel(&mut self, index: u16, color: Rgb) {
        if let Some(pixel) = self.pixels.get_mut(index as usize) {
            *pixel = color;
            self.pixel_writes += 1;
        }
    }

    fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    fn flush(&mut self) {
        self.shown.clone_from(&self.pixels);
        self.flushes += 1;
        debug!(len = self.pixels.len(), lit = self.lit(), "strip flushed");
    }
}

#[cfg(test)]
mod tests {
    use super::{LedStrip, MemoryStrip};
    use crate::protocol::types::Rgb;

    #[test]
    fn writes_become_visible_on_flush() {
        let mut strip = MemoryStrip::new(3);
        strip.set_pixel(1, Rgb::new(1, 2, 3));
        assert!(strip.shown().is_empty());
        strip.flush();
        assert_eq!(strip.shown()[1], Rgb::new(1, 2, 3));
        assert_eq!(strip.lit(), 1);
        assert_eq!(strip.flush_count(), 1);
    }

    #[test]
    fn out_of_range_write_is_ignored() {
        let mut strip = MemoryStrip::new(2);
        strip.set_pixel(2, Rgb::new(9, 9, 9));
        strip.set_pixel(u16::MAX, Rgb::new(9, 9, 9));
        assert_eq!(strip.pixels(), &[Rgb::BLACK, Rgb::BLACK]);
        assert_eq!(strip.pixel_writes(), 0);
    }

    #[test]
    fn set_len_grows_and_shrinks() {
        let mut strip = MemoryStrip::new(1);
        strip.set_len(4);
        assert_eq!(strip.len(), 4);
        strip.set_len(0);
        assert!(strip.is_empty());
    }
}
