//! Reserved vocabulary IDs and the audio codec layout.
//!
//! The generation model shares one vocabulary between text, structural
//! control markers and audio codes. Control markers sit outside the
//! contiguous audio-code range so the scanner can tell them apart.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthesisError};

/// Number of audio-code tokens that make up one codec timestep.
pub const FRAME_SIZE: usize = 7;

/// Structural marker IDs of the generation model's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlTokenSet {
    pub start_of_header: u32,
    pub end_of_header: u32,
    pub start_of_audio: u32,
    pub code_start: u32,
    pub code_end: u32,
    pub text_end: u32,
    pub sequence_start: u32,
}

impl Default for ControlTokenSet {
    fn default() -> Self {
        Self {
            start_of_header: 128259,
            end_of_header: 128260,
            start_of_audio: 128261,
            code_start: 128257,
            code_end: 128258,
            text_end: 128009,
            sequence_start: 128000,
        }
    }
}

impl ControlTokenSet {
    /// Symbolic name and ID of every marker.
    pub fn entries(&self) -> [(&'static str, u32); 7] {
        [
            ("start_of_header", self.start_of_header),
            ("end_of_header", self.end_of_header),
            ("start_of_audio", self.start_of_audio),
            ("code_start", self.code_start),
            ("code_end", self.code_end),
            ("text_end", self.text_end),
            ("sequence_start", self.sequence_start),
        ]
    }

    /// Markers must be pairwise distinct and never collide with audio codes.
    pub fn validate(&self, codec: &CodecConfig) -> Result<()> {
        let entries = self.entries();
        for (i, (name, id)) in entries.iter().enumerate() {
            if let Some((other, _)) = entries[i + 1..].iter().find(|(_, o)| o == id) {
                return Err(SynthesisError::Config(format!(
                    "control tokens '{name}' and '{other}' share ID {id}"
                )));
            }
            if codec.is_audio_code(*id) {
                return Err(SynthesisError::Config(format!(
                    "control token '{name}' ({id}) lies inside the audio-code range [{}, {}]",
                    codec.min_code_id, codec.max_code_id
                )));
            }
        }
        Ok(())
    }
}

/// Layout of the hierarchical audio codec the decoder expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Subtracted from every audio-code token before the modulo.
    pub code_offset: u32,
    /// Inclusive lower bound of the audio-code range.
    pub min_code_id: u32,
    /// Inclusive upper bound of the audio-code range.
    pub max_code_id: u32,
    pub codebook_size: u32,
    /// Leading decoder samples discarded before normalization.
    pub warmup_samples: usize,
    pub sample_rate: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            code_offset: 128266,
            min_code_id: 128266,
            max_code_id: 156937,
            codebook_size: 4096,
            warmup_samples: 2048,
            sample_rate: 24_000,
        }
    }
}

impl CodecConfig {
    #[inline]
    pub fn is_audio_code(&self, id: u32) -> bool {
        (self.min_code_id..=self.max_code_id).contains(&id)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_code_id > self.max_code_id {
            return Err(SynthesisError::Config(format!(
                "audio-code range is empty: min {} > max {}",
                self.min_code_id, self.max_code_id
            )));
        }
        if self.codebook_size == 0 {
            return Err(SynthesisError::Config("codebook_size must be positive".into()));
        }
        if self.sample_rate == 0 {
            return Err(SynthesisError::Config("sample_rate must be positive".into()));
        }
        Ok(())
    }
}
