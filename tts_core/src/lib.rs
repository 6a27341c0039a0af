mod wav;

pub mod backend;
pub mod config;
pub mod error;
pub mod frames;
pub mod prompt;
pub mod scanner;
pub mod tokens;

use std::{sync::Arc, time::Instant};

use tracing::{debug, info, warn};

pub use backend::{CodeDecoder, GenerationParams, TokenGenerator, Waveform};
pub use config::{GenerationConfig, TtsConfig};
pub use error::{Result, SynthesisError};
pub use frames::{FrameUnpacker, HierarchicalCodes};
pub use prompt::{clean_text, Prompt, PromptBuilder, PromptSegment, DEFAULT_VOICE_DESCRIPTION};
pub use scanner::{AudioCodeStream, TokenStreamScanner};
pub use tokens::{CodecConfig, ControlTokenSet, FRAME_SIZE};
pub use wav::{encode_wav, AudioArtifact, AudioPostProcessor};

/// What happened along the way of one synthesis, for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynthesisStats {
    pub generated_tokens: usize,
    pub audio_codes: usize,
    pub frames: usize,
    /// Generation hit `max_new_tokens` without emitting code-end.
    pub generation_exhausted: bool,
    pub generation_ms: u64,
    pub decode_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Synthesis {
    pub audio: AudioArtifact,
    pub stats: SynthesisStats,
}

/// Runs the text-to-speech pipeline around the two neural components.
///
/// Holds only immutable configuration and shared backend handles, so one
/// instance is built at startup and used by every request.
#[derive(Clone)]
pub struct TtsManager {
    config: TtsConfig,
    params: GenerationParams,
    prompts: PromptBuilder,
    scanner: TokenStreamScanner,
    unpacker: FrameUnpacker,
    post: AudioPostProcessor,
    generator: Arc<dyn TokenGenerator>,
    decoder: Arc<dyn CodeDecoder>,
}

impl std::fmt::Debug for TtsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsManager")
            .field("config", &self.config)
            .field("generator", &"<dyn TokenGenerator>")
            .field("decoder", &"<dyn CodeDecoder>")
            .finish()
    }
}

impl TtsManager {
    /// Validate `config` and wire the backends in.
    pub fn new(
        config: TtsConfig,
        generator: Arc<dyn TokenGenerator>,
        decoder: Arc<dyn CodeDecoder>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            params: config.generation_params(),
            prompts: PromptBuilder::new(config.tokens),
            scanner: TokenStreamScanner::new(config.tokens.code_end, config.codec),
            unpacker: FrameUnpacker::new(&config.codec),
            post: AudioPostProcessor::new(&config.codec),
            config,
            generator,
            decoder,
        })
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.codec.sample_rate
    }

    /// Synthesize `text` in the voice described by `description`.
    ///
    /// `speed` is part of the request contract but is not applied to the
    /// audio. Every failure aborts the request; no partial audio is returned.
    pub async fn synthesize(
        &self,
        text: &str,
        description: Option<&str>,
        speed: f32,
    ) -> Result<Synthesis> {
        let prompt = self.prompts.build(description, text)?;
        info!(chars = text.len(), "Synthesizing");
        debug!(prompt = %prompt, "Prompt built");
        if speed != 1.0 {
            debug!(speed, "speed is accepted but not applied");
        }

        let started = Instant::now();
        let tokens = self
            .generator
            .generate(&prompt, &self.params)
            .await
            .map_err(SynthesisError::Generation)?;
        let generation_ms = started.elapsed().as_millis() as u64;
        info!(tokens = tokens.len(), generation_ms, "Generation finished");

        let stream = self.scanner.extract_audio_codes(&tokens)?;
        let generation_exhausted = !stream.terminated();
        if generation_exhausted {
            warn!(
                tokens = tokens.len(),
                max_new_tokens = self.params.max_new_tokens,
                "Generation ended without a code-end token; using the codes scanned so far"
            );
        }

        let leftover = stream.len() % FRAME_SIZE;
        if leftover != 0 {
            debug!(leftover, "Dropping codes that do not fill a frame");
        }
        let codes = self.unpacker.unpack(stream.codes());
        if codes.is_empty() {
            return Err(SynthesisError::InsufficientAudioCodes {
                found: stream.len(),
                required: FRAME_SIZE,
            });
        }
        debug!(frames = codes.frames(), "Unpacked audio codes");

        let started = Instant::now();
        let waveform = self
            .decoder
            .decode(&codes)
            .await
            .map_err(SynthesisError::Decoder)?;
        let decode_ms = started.elapsed().as_millis() as u64;

        let audio = self.post.finalize(waveform)?;
        info!(
            frames = codes.frames(),
            samples = audio.num_samples,
            decode_ms,
            "Audio ready"
        );

        Ok(Synthesis {
            stats: SynthesisStats {
                generated_tokens: tokens.len(),
                audio_codes: stream.len(),
                frames: codes.frames(),
                generation_exhausted,
                generation_ms,
                decode_ms,
            },
            audio,
        })
    }
}
