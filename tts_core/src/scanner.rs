//! Extraction of the audio-code sub-stream from generated token IDs.

use crate::error::{Result, SynthesisError};
use crate::tokens::{CodecConfig, FRAME_SIZE};

/// Audio-code tokens in generation order, all inside the codec's ID range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioCodeStream {
    codes: Vec<u32>,
    terminated: bool,
}

impl AudioCodeStream {
    pub fn codes(&self) -> &[u32] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// False when the model never emitted the code-end token, i.e. generation
    /// stopped at its length cap.
    pub fn terminated(&self) -> bool {
        self.terminated
    }
}

#[derive(Debug, Clone)]
pub struct TokenStreamScanner {
    code_end: u32,
    codec: CodecConfig,
}

impl TokenStreamScanner {
    pub fn new(code_end: u32, codec: CodecConfig) -> Self {
        Self { code_end, codec }
    }

    /// Scan without enforcing a minimum length.
    pub fn scan(&self, tokens: &[u32]) -> AudioCodeStream {
        let end = tokens.iter().position(|&t| t == self.code_end);
        let considered = &tokens[..end.unwrap_or(tokens.len())];
        let codes = considered
            .iter()
            .copied()
            .filter(|&t| self.codec.is_audio_code(t))
            .collect();
        AudioCodeStream {
            codes,
            terminated: end.is_some(),
        }
    }

    /// Scan and require at least one complete frame of audio codes.
    pub fn extract_audio_codes(&self, tokens: &[u32]) -> Result<AudioCodeStream> {
        let stream = self.scan(tokens);
        if stream.len() < FRAME_SIZE {
            return Err(SynthesisError::InsufficientAudioCodes {
                found: stream.len(),
                required: FRAME_SIZE,
            });
        }
        Ok(stream)
    }
}
