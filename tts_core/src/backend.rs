//! Capability interfaces for the two neural components.
//!
//! Both are loaded or connected once per process and shared read-only by all
//! requests; any implementation (local inference, a remote service, a test
//! double) can be plugged into [`crate::TtsManager`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::frames::HierarchicalCodes;
use crate::prompt::Prompt;

/// Sampling knobs forwarded to the generation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
    pub min_new_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    /// Generation stops once this ID is produced (the code-end marker).
    pub eos_token_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad_token_id: Option<u32>,
}

/// Mono float samples produced by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// The language model that continues a prompt with audio-code tokens.
#[async_trait]
pub trait TokenGenerator: Send + Sync {
    /// Returns only the newly generated IDs, starting right after the prompt.
    async fn generate(&self, prompt: &Prompt, params: &GenerationParams)
        -> anyhow::Result<Vec<u32>>;
}

/// The neural codec decoder turning hierarchical codes into audio.
#[async_trait]
pub trait CodeDecoder: Send + Sync {
    async fn decode(&self, codes: &HierarchicalCodes) -> anyhow::Result<Waveform>;
}
