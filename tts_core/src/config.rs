// Vocabulary, codec and sampling configuration shared by every request.

use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::backend::GenerationParams;
use crate::error::{Result, SynthesisError};
use crate::tokens::{CodecConfig, ControlTokenSet, FRAME_SIZE};

/// Sampling defaults the model was tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    /// 28 tokens = at least four frames.
    pub min_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    pub pad_token_id: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 2048,
            min_new_tokens: 4 * FRAME_SIZE,
            temperature: 0.3,
            top_p: 0.95,
            repetition_penalty: 1.1,
            pad_token_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub tokens: ControlTokenSet,
    pub codec: CodecConfig,
    pub generation: GenerationConfig,
}

impl TtsConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(p.as_ref())
            .with_context(|| format!("Failed to load {}", p.as_ref().display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid TTS config", p.as_ref().display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.codec.validate()?;
        self.tokens.validate(&self.codec)?;

        let g = &self.generation;
        if g.max_new_tokens < FRAME_SIZE {
            return Err(SynthesisError::Config(format!(
                "max_new_tokens must allow at least one frame ({FRAME_SIZE} tokens)"
            )));
        }
        if g.min_new_tokens > g.max_new_tokens {
            return Err(SynthesisError::Config(format!(
                "min_new_tokens ({}) exceeds max_new_tokens ({})",
                g.min_new_tokens, g.max_new_tokens
            )));
        }
        if !(g.temperature.is_finite() && g.temperature > 0.0) {
            return Err(SynthesisError::Config("temperature must be positive".into()));
        }
        if !(g.top_p > 0.0 && g.top_p <= 1.0) {
            return Err(SynthesisError::Config("top_p must be in (0, 1]".into()));
        }
        if !(g.repetition_penalty.is_finite() && g.repetition_penalty > 0.0) {
            return Err(SynthesisError::Config(
                "repetition_penalty must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Parameters for one generation call; generation stops at code-end.
    pub fn generation_params(&self) -> GenerationParams {
        let g = &self.generation;
        GenerationParams {
            max_new_tokens: g.max_new_tokens,
            min_new_tokens: g.min_new_tokens,
            temperature: g.temperature,
            top_p: g.top_p,
            repetition_penalty: g.repetition_penalty,
            eos_token_id: self.tokens.code_end,
            pad_token_id: g.pad_token_id,
        }
    }
}
