//! Unpacking of 7-token frames into the decoder's three code levels.
//!
//! Slot layout per frame `[s0 .. s6]`:
//!
//! | level | slots          |
//! |-------|----------------|
//! | 1     | s0             |
//! | 2     | s1, s4         |
//! | 3     | s2, s3, s5, s6 |
//!
//! The interleaving is what the decoder's codebooks were trained on. Any
//! other assignment still decodes, just to noise.

use serde::Serialize;

use crate::tokens::{CodecConfig, FRAME_SIZE};

/// Coarse-to-fine codes with lengths `n`, `2n` and `4n` for `n` frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchicalCodes {
    pub level1: Vec<u32>,
    pub level2: Vec<u32>,
    pub level3: Vec<u32>,
}

impl HierarchicalCodes {
    pub fn frames(&self) -> usize {
        self.level1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.level1.is_empty()
    }

    pub fn levels(&self) -> [&[u32]; 3] {
        [&self.level1, &self.level2, &self.level3]
    }
}

#[derive(Debug, Clone)]
pub struct FrameUnpacker {
    code_offset: u32,
    codebook_size: u32,
}

impl FrameUnpacker {
    pub fn new(codec: &CodecConfig) -> Self {
        Self {
            code_offset: codec.code_offset,
            codebook_size: codec.codebook_size,
        }
    }

    #[inline]
    fn value(&self, token: u32) -> u32 {
        (i64::from(token) - i64::from(self.code_offset)).rem_euclid(i64::from(self.codebook_size))
            as u32
    }

    /// Trailing codes that do not fill a frame are dropped.
    pub fn unpack(&self, codes: &[u32]) -> HierarchicalCodes {
        let frames = codes.len() / FRAME_SIZE;
        let mut out = HierarchicalCodes {
            level1: Vec::with_capacity(frames),
            level2: Vec::with_capacity(frames * 2),
            level3: Vec::with_capacity(frames * 4),
        };

        for frame in codes.chunks_exact(FRAME_SIZE) {
            let v = |slot: usize| self.value(frame[slot]);
            out.level1.push(v(0));
            out.level2.extend([v(1), v(4)]);
            out.level3.extend([v(2), v(3), v(5), v(6)]);
        }

        out
    }
}
