//! GS local memory (4 MiB of embedded DRAM).
//!
//! Frame buffers are addressed in 32-bit words: a buffer starts at
//! `fbp * 2048` words and is `fbw * 64` pixels wide. Pixels are stored
//! row-major (PSMCT32, unswizzled) as ABGR32, red in the low byte.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Local memory size in bytes.
pub const LOCAL_MEMORY_SIZE: usize = 4 * 1024 * 1024;

const LOCAL_MEMORY_WORDS: usize = LOCAL_MEMORY_SIZE / 4;

/// Words per frame buffer page (FBP unit).
pub const WORDS_PER_PAGE: u32 = 2048;

/// Pixels per FBW unit.
pub const PIXELS_PER_WIDTH_UNIT: u32 = 64;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMemory {
    words: Vec<u32>,
}

impl Default for LocalMemory {
    fn default() -> Self {
        Self {
            words: vec![0; LOCAL_MEMORY_WORDS],
        }
    }
}

impl std::fmt::Debug for LocalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMemory")
            .field("words", &self.words.len())
            .finish()
    }
}

impl LocalMemory {
    /// `false` for a decoded memory of the wrong size.
    #[must_use]
    pub fn has_full_size(&self) -> bool {
        self.words.len() == LOCAL_MEMORY_WORDS
    }

    fn word_index(fbp: u32, fbw: u32, x: u32, y: u32) -> Option<usize> {
        let width = fbw * PIXELS_PER_WIDTH_UNIT;
        if x >= width {
            return None;
        }

        let index = u64::from(fbp) * u64::from(WORDS_PER_PAGE)
            + u64::from(y) * u64::from(width)
            + u64::from(x);
        let index = usize::try_from(index).ok()?;
        (index < LOCAL_MEMORY_WORDS).then_some(index)
    }

    /// Reads a pixel of the buffer at (`fbp`, `fbw`). Out of range reads as zero.
    #[must_use]
    pub fn read_pixel(&self, fbp: u32, fbw: u32, x: u32, y: u32) -> u32 {
        Self::word_index(fbp, fbw, x, y).map_or(0, |i| self.words[i])
    }

    /// Writes a pixel, keeping the bits set in `mask`. Out of range writes are dropped.
    pub fn write_pixel(&mut self, fbp: u32, fbw: u32, x: u32, y: u32, value: u32, mask: u32) {
        if let Some(i) = Self::word_index(fbp, fbw, x, y) {
            let old = self.words[i];
            self.words[i] = (old & mask) | (value & !mask);
        }
    }

    /// Streams the whole memory, little endian, to `sink`.
    ///
    /// # Errors
    /// Propagates any error from the sink.
    pub fn dump(&self, sink: &mut dyn Write) -> io::Result<()> {
        let mut chunk = Vec::with_capacity(64 * 1024);
        for words in self.words.chunks(16 * 1024) {
            chunk.clear();
            for word in words {
                chunk.extend_from_slice(&word.to_le_bytes());
            }
            sink.write_all(&chunk)?;
        }
        sink.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pixels_are_row_major_per_buffer() {
        let mut mem = LocalMemory::default();
        mem.write_pixel(0, 10, 3, 2, 0xFF00_00FF, 0);
        assert_eq!(mem.read_pixel(0, 10, 3, 2), 0xFF00_00FF);
        assert_eq!(mem.words[2 * 640 + 3], 0xFF00_00FF);

        // Different base pointer, different storage.
        assert_eq!(mem.read_pixel(1, 10, 3, 2), 0);
        mem.write_pixel(1, 10, 0, 0, 7, 0);
        assert_eq!(mem.words[2048], 7);
    }

    #[test]
    fn masked_bits_are_preserved() {
        let mut mem = LocalMemory::default();
        mem.write_pixel(0, 1, 0, 0, 0x1122_3344, 0);
        mem.write_pixel(0, 1, 0, 0, 0xAABB_CCDD, 0xFF00_0000);
        assert_eq!(mem.read_pixel(0, 1, 0, 0), 0x11BB_CCDD);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut mem = LocalMemory::default();
        mem.write_pixel(0, 1, 64, 0, 1, 0);
        mem.write_pixel(511, 63, 4000, 4000, 1, 0);
        assert_eq!(mem.read_pixel(0, 1, 64, 0), 0);
        assert_eq!(mem.read_pixel(511, 63, 4000, 4000), 0);
        assert!(mem.words.iter().all(|&w| w == 0));
    }

    #[test]
    fn dump_writes_every_byte() {
        let mut mem = LocalMemory::default();
        mem.write_pixel(0, 1, 1, 0, 0x0403_0201, 0);

        let mut out = Vec::new();
        mem.dump(&mut out).unwrap();
        assert_eq!(out.len(), LOCAL_MEMORY_SIZE);
        assert_eq!(&out[4..8], &[1, 2, 3, 4]);
    }
}
